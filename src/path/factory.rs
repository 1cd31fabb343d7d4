//! Registry of path specification constructors keyed by type indicator.
//!
//! The process-wide [`PathSpecFactory::global`] instance starts empty and is
//! populated by [`crate::register_all`]. Independent instances can be created
//! with [`PathSpecFactory::new`].

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use super::{Attributes, PathSpec};
use crate::definitions::TypeIndicator;
use crate::sync::{read_or_recover, write_or_recover};
use crate::{Error, Result};

/// Builds a path specification from attributes and an optional parent.
pub type PathSpecConstructor = fn(Attributes, Option<PathSpec>) -> Result<PathSpec>;

static GLOBAL: Lazy<PathSpecFactory> = Lazy::new(PathSpecFactory::new);

/// A lock-protected table from type indicator to constructor.
#[derive(Debug, Default)]
pub struct PathSpecFactory {
    constructors: RwLock<HashMap<TypeIndicator, PathSpecConstructor>>,
}

impl PathSpecFactory {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide factory.
    pub fn global() -> &'static PathSpecFactory {
        &GLOBAL
    }

    /// Binds a constructor to a type indicator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] if the type indicator is bound.
    pub fn register(
        &self,
        type_indicator: TypeIndicator,
        constructor: PathSpecConstructor,
    ) -> Result<()> {
        let mut constructors = write_or_recover(&self.constructors);
        if constructors.contains_key(&type_indicator) {
            return Err(Error::already_registered(type_indicator.as_str()));
        }
        constructors.insert(type_indicator, constructor);
        Ok(())
    }

    /// Removes the constructor bound to a type indicator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if nothing is bound.
    pub fn deregister(&self, type_indicator: TypeIndicator) -> Result<()> {
        write_or_recover(&self.constructors)
            .remove(&type_indicator)
            .map(|_| ())
            .ok_or_else(|| Error::not_registered(type_indicator.as_str()))
    }

    /// Returns `true` if a constructor is bound to the type indicator.
    pub fn is_registered(&self, type_indicator: TypeIndicator) -> bool {
        read_or_recover(&self.constructors).contains_key(&type_indicator)
    }

    /// Constructs a path specification through the registered constructor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if nothing is bound, otherwise
    /// whatever the constructor reports.
    pub fn new_path_spec(
        &self,
        type_indicator: TypeIndicator,
        attributes: Attributes,
        parent: Option<PathSpec>,
    ) -> Result<PathSpec> {
        let constructor = read_or_recover(&self.constructors)
            .get(&type_indicator)
            .copied()
            .ok_or_else(|| Error::not_registered(type_indicator.as_str()))?;
        constructor(attributes, parent)
    }

    /// Registers the strict attribute constructor for every built-in kind.
    pub fn register_defaults(&self) -> Result<()> {
        for type_indicator in TypeIndicator::ALL {
            self.register(type_indicator, constructor_for(type_indicator))?;
        }
        Ok(())
    }
}

fn constructor_for(type_indicator: TypeIndicator) -> PathSpecConstructor {
    match type_indicator {
        TypeIndicator::Os => |a, p| PathSpec::from_attributes(TypeIndicator::Os, a, p),
        TypeIndicator::DataRange => {
            |a, p| PathSpec::from_attributes(TypeIndicator::DataRange, a, p)
        }
        TypeIndicator::Tar => |a, p| PathSpec::from_attributes(TypeIndicator::Tar, a, p),
        TypeIndicator::EncryptedStream => {
            |a, p| PathSpec::from_attributes(TypeIndicator::EncryptedStream, a, p)
        }
        TypeIndicator::SevenZ => |a, p| PathSpec::from_attributes(TypeIndicator::SevenZ, a, p),
    }
}
