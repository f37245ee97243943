// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Resolution of a product request to one installed product.

use std::path::{Path, PathBuf};

use crate::flavor::Flavor;
use crate::product::Product;
use crate::stack::Stack;
use crate::version::VersionSpec;
use crate::vro::Strategy;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./resolver_test.rs"]
mod resolver_test;

/// What the caller asked for.
#[derive(Debug, Clone, Default)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub version: Option<VersionSpec>,
    pub tag: Option<String>,
    /// Directory to take the product from instead of a stack.
    pub root: Option<PathBuf>,
}

impl ProductRequest {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: VersionSpec) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = Some(root.into());
        self
    }
}

/// Picks installed products from an ordered list of stacks.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    stacks: &'a [Stack],
    flavor: &'a Flavor,
}

impl<'a> Resolver<'a> {
    pub fn new(stacks: &'a [Stack], flavor: &'a Flavor) -> Self {
        Self { stacks, flavor }
    }

    /// Resolve `request` to an installed product.
    ///
    /// With `exact` and a literal version only that version is looked up.
    /// Otherwise each strategy of `vro` is tried in order, and within a
    /// strategy each stack in order; the first product found wins.
    pub fn resolve(
        &self,
        request: &ProductRequest,
        vro: &[Strategy],
        exact: bool,
    ) -> Result<Product> {
        let name = match (&request.name, &request.root) {
            (Some(name), _) => name.as_str(),
            (None, Some(root)) => return Product::from_root(root, None, self.flavor.clone()),
            (None, None) => {
                return Err(Error::UnderSpecifiedProduct {
                    name: None,
                    version: request.version.as_ref().map(ToString::to_string),
                    flavor: Some(self.flavor.to_string()),
                });
            }
        };

        if exact {
            if let Some(version) = request.version.as_ref().and_then(VersionSpec::literal) {
                tracing::debug!("looking for exactly {name} {version}");
                return self
                    .find_version(name, version)?
                    .ok_or_else(|| self.not_found(name, request));
            }
        }

        for strategy in vro {
            tracing::trace!("trying {strategy} for {name}");
            if let Some(product) = self.try_strategy(name, strategy, request)? {
                tracing::debug!("{strategy} selected {product}");
                return Ok(product);
            }
        }
        Err(self.not_found(name, request))
    }

    fn try_strategy(
        &self,
        name: &str,
        strategy: &Strategy,
        request: &ProductRequest,
    ) -> Result<Option<Product>> {
        match strategy {
            Strategy::Path => match &request.root {
                Some(root) => self.from_root(root, name).map(Some),
                None => Ok(None),
            },
            Strategy::CommandLineVersion => match &request.version {
                Some(VersionSpec::Exact(version)) => self.find_version(name, version),
                Some(spec) => self.find_best(name, spec),
                None => Ok(None),
            },
            Strategy::Tag(tag) => self.find_tagged(name, Some(tag.as_str()), request),
            Strategy::Default => self.find_tagged(name, None, request),
        }
    }

    fn from_root(&self, root: &Path, name: &str) -> Result<Product> {
        Product::from_root(root, Some(name), self.flavor.clone())
    }

    fn find_version(&self, name: &str, version: &str) -> Result<Option<Product>> {
        for stack in self.stacks {
            if let Some(product) = stack.find_product(name, version, self.flavor)? {
                return Ok(Some(product));
            }
        }
        Ok(None)
    }

    /// Newest version satisfying `spec`, taken from the first stack that
    /// has one.
    fn find_best(&self, name: &str, spec: &VersionSpec) -> Result<Option<Product>> {
        for stack in self.stacks {
            let versions = stack.versions(name, self.flavor)?;
            if let Some(version) = spec.best_match(versions.iter().map(String::as_str)) {
                return stack.find_product(name, version, self.flavor);
            }
        }
        Ok(None)
    }

    /// Follow `tag`, or each stack's default tag when `tag` is `None`.
    fn find_tagged(
        &self,
        name: &str,
        tag: Option<&str>,
        request: &ProductRequest,
    ) -> Result<Option<Product>> {
        for stack in self.stacks {
            let tag = tag.unwrap_or_else(|| stack.default_tag());
            let Some(version) = stack.tagged_version(name, tag, self.flavor)? else {
                continue;
            };
            if let Some(spec @ VersionSpec::Expr(_)) = &request.version {
                if !spec.is_satisfied_by(&version) {
                    tracing::debug!("{name} {version} tagged {tag} does not satisfy {spec}");
                    continue;
                }
            }
            match stack.find_product(name, &version, self.flavor)? {
                Some(product) => return Ok(Some(product)),
                None => tracing::warn!(
                    "{name} is tagged {tag} at {version} in {} but that version is not declared",
                    stack.root().display()
                ),
            }
        }
        Ok(None)
    }

    fn not_found(&self, name: &str, request: &ProductRequest) -> Error {
        Error::ProductNotFound {
            name: name.to_string(),
            version: request.version.as_ref().map(ToString::to_string),
            flavors: self.flavor.fallbacks(),
            stack: match self.stacks {
                [only] => Some(only.root().to_path_buf()),
                _ => None,
            },
        }
    }
}
