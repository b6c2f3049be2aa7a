//! Response contracts for request messages.
//!
//! A request port is typed by its message type `T` and response type `R`, so
//! a mismatch between a handler and a caller is always caught by the
//! compiler. What the type system cannot see is the *intent* attached to a
//! message type: a message may be meant to be answered with one specific type,
//! or with one of several alternatives. Such intent is registered with
//! [`Runtime::declare_response`](crate::runtime::Runtime::declare_response) as
//! a [`ResponseContract`], and every request port using the message type is
//! checked against it when its owner is first wired by the engine.
//!
//! Alternative responses are expressed with [`Either`] and [`Either3`];
//! [`AnyResponse`] is the untyped escape hatch, which is only accepted when
//! the message has no contract.
//!
//! #### Example
//!
//! ```
//! use portwire::response::{Either, ResponseContract};
//! use portwire::runtime::Runtime;
//!
//! struct Lookup(u32);
//! struct Found(String);
//! struct Missing;
//!
//! let runtime = Runtime::new();
//! runtime
//!     .declare_response::<Lookup>(ResponseContract::either::<Found, Missing>())
//!     .unwrap();
//!
//! // Request ports of type `RequestPort<Lookup, Either<Found, Missing>>` are
//! // accepted; `RequestPort<Lookup, Found>` would be rejected on connection.
//! # let _: Option<Either<Found, Missing>> = None;
//! ```

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::connect::ConnectError;
use crate::ports::TypeInfo;

/// An untyped response.
pub type AnyResponse = Box<dyn Any + Send>;

/// A response that is one of two alternatives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Either<A, B> {
    /// The first alternative.
    First(A),
    /// The second alternative.
    Second(B),
}

/// A response that is one of three alternatives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Either3<A, B, C> {
    /// The first alternative.
    First(A),
    /// The second alternative.
    Second(B),
    /// The third alternative.
    Third(C),
}

/// The response expected for a request message type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseContract {
    kind: ContractKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ContractKind {
    Single(TypeInfo),
    Union {
        branches: Vec<TypeInfo>,
        /// The `Either`/`Either3` type covering all branches.
        accepted: TypeInfo,
        /// Two-way unions covering only some of the branches.
        partial: Vec<TypeInfo>,
    },
}

impl ResponseContract {
    /// The message must be answered with an `R`.
    pub fn single<R: 'static>() -> Self {
        Self {
            kind: ContractKind::Single(TypeInfo::of::<R>()),
        }
    }

    /// The message must be answered with an `Either<A, B>`.
    pub fn either<A: 'static, B: 'static>() -> Self {
        Self {
            kind: ContractKind::Union {
                branches: vec![TypeInfo::of::<A>(), TypeInfo::of::<B>()],
                accepted: TypeInfo::of::<Either<A, B>>(),
                partial: Vec::new(),
            },
        }
    }

    /// The message must be answered with an `Either3<A, B, C>`.
    pub fn either3<A: 'static, B: 'static, C: 'static>() -> Self {
        Self {
            kind: ContractKind::Union {
                branches: vec![TypeInfo::of::<A>(), TypeInfo::of::<B>(), TypeInfo::of::<C>()],
                accepted: TypeInfo::of::<Either3<A, B, C>>(),
                partial: vec![
                    TypeInfo::of::<Either<A, B>>(),
                    TypeInfo::of::<Either<B, A>>(),
                    TypeInfo::of::<Either<A, C>>(),
                    TypeInfo::of::<Either<C, A>>(),
                    TypeInfo::of::<Either<B, C>>(),
                    TypeInfo::of::<Either<C, B>>(),
                ],
            },
        }
    }

    /// Returns the declared response type(s).
    pub fn branches(&self) -> &[TypeInfo] {
        match &self.kind {
            ContractKind::Single(response) => std::slice::from_ref(response),
            ContractKind::Union { branches, .. } => branches,
        }
    }

    fn validate(&self, request: TypeInfo) -> Result<(), ConnectError> {
        if let ContractKind::Union { branches, .. } = &self.kind {
            let distinct = branches
                .iter()
                .enumerate()
                .all(|(i, b)| !branches[..i].contains(b));
            if !distinct {
                return Err(ConnectError::InvalidResponseDeclaration {
                    request,
                    reason: "response alternatives must be distinct types",
                });
            }
        }

        Ok(())
    }

    fn check(&self, request: TypeInfo, response: TypeInfo) -> Result<(), ConnectError> {
        let is_untyped = response == TypeInfo::of::<AnyResponse>();
        match &self.kind {
            ContractKind::Single(expected) if *expected == response => Ok(()),
            ContractKind::Union { accepted, .. } if *accepted == response => Ok(()),
            ContractKind::Union { .. } if is_untyped => Err(ConnectError::RawUnionType { request }),
            ContractKind::Union {
                branches, partial, ..
            } if partial.contains(&response) => Err(ConnectError::InsufficientResponseTypes {
                request,
                declared: branches.len(),
                found: 2,
            }),
            _ => Err(ConnectError::ResponseTypeMismatch {
                request,
                expected: self.to_string(),
                found: response,
            }),
        }
    }
}

impl fmt::Display for ResponseContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ContractKind::Single(response) => write!(f, "{}", response),
            ContractKind::Union { accepted, .. } => write!(f, "{}", accepted),
        }
    }
}

/// The response contracts registered with a runtime.
#[derive(Default, Debug)]
pub(crate) struct ResponseContracts(HashMap<TypeInfo, ResponseContract>);

impl ResponseContracts {
    /// Registers a contract for a request message type.
    ///
    /// Re-declaring an identical contract is a no-op.
    pub(crate) fn declare(
        &mut self,
        request: TypeInfo,
        contract: ResponseContract,
    ) -> Result<(), ConnectError> {
        contract.validate(request)?;

        match self.0.entry(request) {
            Entry::Vacant(e) => {
                e.insert(contract);
                Ok(())
            }
            Entry::Occupied(e) if *e.get() == contract => Ok(()),
            Entry::Occupied(_) => Err(ConnectError::InvalidResponseDeclaration {
                request,
                reason: "a different response contract was already declared",
            }),
        }
    }

    /// Checks the response type of a request port against the contract of its
    /// message type.
    pub(crate) fn check(&self, request: TypeInfo, response: TypeInfo) -> Result<(), ConnectError> {
        match self.0.get(&request) {
            Some(contract) => contract.check(request, response),
            None if response == TypeInfo::of::<AnyResponse>() => {
                Err(ConnectError::InvalidResponseDeclaration {
                    request,
                    reason: "an untyped response requires a declared response contract",
                })
            }
            None => Ok(()),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}
