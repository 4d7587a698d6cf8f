//! Single-method adapter classes
//!
//! An adapter satisfies a native single-method contract by forwarding every
//! call of that method to a callable held in the class's static slot.
//! Arguments and results pass through untouched.

use std::fmt;
use std::sync::Arc;

use crate::class::ClassId;
use crate::error::{MirrorError, MirrorResult};
use crate::value::Value;

/// The callable an adapter forwards to
pub type AdapterFn = Arc<dyn Fn(&[Value]) -> MirrorResult<Value> + Send + Sync>;

/// A single-method interface description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdapterContract {
    /// Interface name
    pub interface: String,
    /// The one method name
    pub method: String,
    /// Number of arguments the method takes
    pub arity: usize,
}

impl AdapterContract {
    /// Create a contract
    pub fn new(interface: impl Into<String>, method: impl Into<String>, arity: usize) -> Self {
        Self {
            interface: interface.into(),
            method: method.into(),
            arity,
        }
    }
}

/// A synthesized adapter class.
pub struct AdapterClass {
    id: ClassId,
    qualified_name: String,
    contract: AdapterContract,
    callable: AdapterFn,
}

impl AdapterClass {
    pub(crate) fn new(
        id: ClassId,
        qualified_name: String,
        contract: AdapterContract,
        callable: AdapterFn,
    ) -> Self {
        Self {
            id,
            qualified_name,
            contract,
            callable,
        }
    }

    /// Class id
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Fully qualified name
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Implemented contract
    pub fn contract(&self) -> &AdapterContract {
        &self.contract
    }

    /// Create an instance satisfying the contract
    pub fn instantiate(self: &Arc<Self>) -> AdapterInstance {
        AdapterInstance {
            class: Arc::clone(self),
        }
    }
}

impl fmt::Debug for AdapterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterClass")
            .field("id", &self.id)
            .field("qualified_name", &self.qualified_name)
            .field("contract", &self.contract)
            .finish()
    }
}

/// Instance of an adapter class.
#[derive(Debug, Clone)]
pub struct AdapterInstance {
    class: Arc<AdapterClass>,
}

impl AdapterInstance {
    /// The adapter class
    pub fn class(&self) -> &Arc<AdapterClass> {
        &self.class
    }

    /// Invoke a method by name. Only the contract's method exists.
    pub fn invoke(&self, method: &str, args: &[Value]) -> MirrorResult<Value> {
        let contract = &self.class.contract;
        if method != contract.method {
            return Err(self.mismatch(format!(
                "{} has no method '{}', only '{}'",
                contract.interface, method, contract.method
            )));
        }
        self.call(args)
    }

    /// Invoke the contract's method
    pub fn call(&self, args: &[Value]) -> MirrorResult<Value> {
        let contract = &self.class.contract;
        if args.len() != contract.arity {
            return Err(self.mismatch(format!(
                "{}.{} takes {} argument(s), got {}",
                contract.interface,
                contract.method,
                contract.arity,
                args.len()
            )));
        }
        (self.class.callable)(args)
    }

    fn mismatch(&self, detail: String) -> MirrorError {
        MirrorError::AdapterMismatch {
            class: self.class.qualified_name.clone(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder() -> Arc<AdapterClass> {
        let callable: AdapterFn = Arc::new(|args| match (&args[0], &args[1]) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            _ => Ok(Value::Null),
        });
        Arc::new(AdapterClass::new(
            ClassId::new(7),
            "test.Adder.GeneratedClass".to_string(),
            AdapterContract::new("BinaryOperator", "apply", 2),
            callable,
        ))
    }

    #[test]
    fn test_forwards_call() {
        let instance = adder().instantiate();
        assert_eq!(
            instance.invoke("apply", &[Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn test_wrong_method_or_arity() {
        let instance = adder().instantiate();
        assert!(matches!(
            instance.invoke("andThen", &[Value::Int(1), Value::Int(1)]),
            Err(MirrorError::AdapterMismatch { .. })
        ));
        assert!(matches!(
            instance.call(&[Value::Int(1)]),
            Err(MirrorError::AdapterMismatch { .. })
        ));
    }
}
