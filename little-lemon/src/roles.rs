//! Caller roles and the access rules built on them.
//!
//! Catalog and group administration follow the staff flag. Order gates look at
//! group membership directly, so a caller in several groups passes every gate
//! one of those groups opens. `Role` is the single label reported to clients.
//! Handlers only consult the predicates here.

use crate::models::{Order, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Manager,
    DeliveryCrew,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::Manager, Group::DeliveryCrew];

    /// Name as stored in the `groups` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Group::Manager => "Manager",
            Group::DeliveryCrew => "Delivery crew",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Manager,
    DeliveryCrew,
    Customer,
}

impl Role {
    /// Display label: staff outranks group membership, Manager outranks Delivery crew.
    pub fn resolve(is_staff: bool, groups: &[Group]) -> Self {
        if is_staff {
            Role::Admin
        } else if groups.contains(&Group::Manager) {
            Role::Manager
        } else if groups.contains(&Group::DeliveryCrew) {
            Role::DeliveryCrew
        } else {
            Role::Customer
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::DeliveryCrew => "delivery_crew",
            Role::Customer => "customer",
        }
    }
}

/// Which orders a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    All,
    AssignedTo(i64),
}

impl OrderScope {
    pub fn admits(self, order: &Order) -> bool {
        match self {
            OrderScope::All => true,
            OrderScope::AssignedTo(crew_id) => order.delivery_crew_id == Some(crew_id),
        }
    }
}

/// The authenticated account behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user: User,
    pub groups: Vec<Group>,
    pub role: Role,
}

impl Caller {
    pub fn new(user: User, groups: Vec<Group>) -> Self {
        let role = Role::resolve(user.is_staff, &groups);
        Self { user, groups, role }
    }

    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn can_manage_catalog(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_manage_groups(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn in_group(&self, group: Group) -> bool {
        self.groups.contains(&group)
    }

    pub fn can_assign_delivery(&self) -> bool {
        self.in_group(Group::Manager)
    }

    /// Only the crew member assigned to this very order may change its status.
    pub fn can_update_status(&self, order: &Order) -> bool {
        self.in_group(Group::DeliveryCrew) && order.delivery_crew_id == Some(self.id())
    }

    /// Delivery crew membership narrows the view to assigned orders, whatever else the caller is.
    pub fn order_scope(&self) -> OrderScope {
        if self.in_group(Group::DeliveryCrew) {
            OrderScope::AssignedTo(self.id())
        } else {
            OrderScope::All
        }
    }
}
