//! Newtypes for resolved identifiers to avoid stringly-typed code.

use std::fmt;
use std::ops::Deref;

macro_rules! newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, PartialEq)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the raw identifier.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

newtype!(
    /// Network interface identifier (`eni-…`) bound to a task.
    InterfaceId
);

/// Ordered, non-empty set of task ARNs observed in a cluster.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskSet(Vec<String>);

impl TaskSet {
    /// Wraps a listing, returning `None` when it is empty.
    #[must_use]
    pub fn new(task_arns: Vec<String>) -> Option<Self> {
        if task_arns.is_empty() {
            None
        } else {
            Some(Self(task_arns))
        }
    }

    /// The first task ARN; the only one resolution steps look at.
    #[must_use]
    pub fn first(&self) -> &str {
        self.0.first().map_or("", String::as_str)
    }

    /// All task ARNs in listing order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of tasks in the set, always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the set, returning the ARNs.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Returns the short task identifier: the last `/` segment of its ARN.
#[must_use]
pub fn short_task_id(task_arn: &str) -> &str {
    task_arn.rsplit('/').next().unwrap_or(task_arn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("arn:aws:ecs:us-west-2:123456789012:task/svc/0123abcd", "0123abcd")]
    #[case("arn:1", "arn:1")]
    #[case("cluster/", "")]
    fn short_task_id_takes_last_segment(#[case] arn: &str, #[case] expected: &str) {
        assert_eq!(short_task_id(arn), expected);
    }

    #[test]
    fn task_set_rejects_empty_listings() {
        assert!(TaskSet::new(Vec::new()).is_none());
        let set = TaskSet::new(vec![String::from("arn:1"), String::from("arn:2")])
            .expect("non-empty listing");
        assert_eq!(set.first(), "arn:1");
        assert_eq!(set.len(), 2);
    }
}
