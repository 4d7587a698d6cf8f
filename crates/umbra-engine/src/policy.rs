//! Write policy for mirror setters

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What a generated setter does besides updating its local field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Write through `set-attribute` immediately
    #[default]
    Push,
    /// Keep the write local until `MirrorGraph::resync`
    LocalOnly,
}

impl WritePolicy {
    const fn to_raw(self) -> u8 {
        match self {
            WritePolicy::Push => 0,
            WritePolicy::LocalOnly => 1,
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => WritePolicy::LocalOnly,
            _ => WritePolicy::Push,
        }
    }
}

/// Shared, runtime-settable write policy.
///
/// Every graph produced by one session manager holds a clone of the same
/// switch. Setters read it at the moment they run, so a change is seen by
/// the next setter call on any graph. Callers racing a policy change against
/// setter calls on another thread get whichever value wins.
#[derive(Debug, Clone, Default)]
pub struct PolicySwitch {
    raw: Arc<AtomicU8>,
}

impl PolicySwitch {
    /// Create a switch holding `policy`
    pub fn new(policy: WritePolicy) -> Self {
        Self {
            raw: Arc::new(AtomicU8::new(policy.to_raw())),
        }
    }

    /// Current policy
    #[inline]
    pub fn get(&self) -> WritePolicy {
        WritePolicy::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// Change the policy, returning the previous one
    pub fn set(&self, policy: WritePolicy) -> WritePolicy {
        WritePolicy::from_raw(self.raw.swap(policy.to_raw(), Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_is_shared_between_clones() {
        let switch = PolicySwitch::new(WritePolicy::Push);
        let other = switch.clone();
        assert_eq!(other.set(WritePolicy::LocalOnly), WritePolicy::Push);
        assert_eq!(switch.get(), WritePolicy::LocalOnly);
    }

    #[test]
    fn test_default_is_push() {
        assert_eq!(PolicySwitch::default().get(), WritePolicy::Push);
        assert_eq!(WritePolicy::default(), WritePolicy::Push);
    }
}
