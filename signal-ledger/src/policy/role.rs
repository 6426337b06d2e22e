use std::fmt;

/// Who a process is in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    Parent,
    /// Child by spawn order, starting at 0.
    Child(usize),
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Parent => write!(f, "parent"),
            ProcessRole::Child(index) => write!(f, "child {index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ProcessRole::Parent.to_string(), "parent");
        assert_eq!(ProcessRole::Child(3).to_string(), "child 3");
    }
}
