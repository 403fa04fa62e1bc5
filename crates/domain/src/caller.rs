//! The authenticated identity behind a request.

use common::{BranchId, CustomerId, EmployeeId, EmployeeRole};

use crate::error::{CafeError, Result};

/// Who is calling, as resolved by the session provider.
///
/// Passed explicitly into every domain operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    Customer {
        id: CustomerId,
    },
    Employee {
        id: EmployeeId,
        role: EmployeeRole,
        branch_id: Option<BranchId>,
    },
}

impl Caller {
    pub fn customer(id: CustomerId) -> Self {
        Caller::Customer { id }
    }

    pub fn employee(id: EmployeeId, role: EmployeeRole, branch_id: Option<BranchId>) -> Self {
        Caller::Employee {
            id,
            role,
            branch_id,
        }
    }

    /// Returns the customer id, or an auth error for anyone else.
    pub fn require_customer(&self) -> Result<CustomerId> {
        match self {
            Caller::Customer { id } => Ok(*id),
            Caller::Anonymous => Err(CafeError::Unauthenticated(
                "Unauthorized. Customer login required.",
            )),
            Caller::Employee { .. } => Err(CafeError::Forbidden("Customer login required.")),
        }
    }

    /// Returns the employee id, or an auth error for anyone else.
    pub fn require_employee(&self) -> Result<EmployeeId> {
        match self {
            Caller::Employee { id, .. } => Ok(*id),
            Caller::Anonymous => Err(CafeError::Unauthenticated(
                "Unauthorized. Employee login required.",
            )),
            Caller::Customer { .. } => Err(CafeError::Forbidden("Employee login required.")),
        }
    }

    /// The employee to attribute a history row to, if any.
    pub fn employee_id(&self) -> Option<EmployeeId> {
        match self {
            Caller::Employee { id, .. } => Some(*id),
            _ => None,
        }
    }
}
