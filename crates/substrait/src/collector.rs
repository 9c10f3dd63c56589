//! Extension anchor allocation for one outbound conversion.

use std::collections::HashMap;

use crate::catalog::TypeAnchor;
use crate::function::{FunctionAnchor, FunctionVariant};
use crate::proto::{
    ExtensionFunctionDecl, ExtensionTypeDecl, SimpleExtensionDeclaration, SimpleExtensionUri,
};

/// Assigns anchors to the catalog entries referenced by one output plan.
///
/// Function and type anchors are separate spaces and both start at 1; anchor
/// 0 is never handed out. A collector lives for exactly one conversion call.
#[derive(Debug, Default)]
pub struct ExtensionCollector {
    functions: HashMap<FunctionAnchor, u32>,
    function_order: Vec<FunctionAnchor>,
    types: HashMap<TypeAnchor, u32>,
    type_order: Vec<TypeAnchor>,
}

impl ExtensionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor for `variant`, allocating the next one on first use.
    pub fn function_reference(&mut self, variant: &FunctionVariant) -> u32 {
        let anchor = variant.anchor();
        if let Some(&existing) = self.functions.get(&anchor) {
            return existing;
        }
        let next = self.function_order.len() as u32 + 1;
        self.functions.insert(anchor.clone(), next);
        self.function_order.push(anchor);
        next
    }

    /// Anchor for a user-defined type, allocating the next one on first use.
    pub fn type_reference(&mut self, ty: &TypeAnchor) -> u32 {
        if let Some(&existing) = self.types.get(ty) {
            return existing;
        }
        let next = self.type_order.len() as u32 + 1;
        self.types.insert(ty.clone(), next);
        self.type_order.push(ty.clone());
        next
    }

    pub fn function_count(&self) -> usize {
        self.function_order.len()
    }

    pub fn type_count(&self) -> usize {
        self.type_order.len()
    }

    /// Renders the extension header: one uri entry per distinct uri and one
    /// declaration per referenced entry, in anchor order.
    pub fn render(self) -> (Vec<SimpleExtensionUri>, Vec<SimpleExtensionDeclaration>) {
        let mut uris: Vec<SimpleExtensionUri> = Vec::new();
        let mut uri_anchor = |uri: &str| -> u32 {
            if let Some(u) = uris.iter().find(|u| u.uri == uri) {
                return u.extension_uri_anchor;
            }
            let anchor = uris.len() as u32 + 1;
            uris.push(SimpleExtensionUri {
                extension_uri_anchor: anchor,
                uri: uri.to_string(),
            });
            anchor
        };

        let mut decls = Vec::with_capacity(self.function_order.len() + self.type_order.len());
        for (i, f) in self.function_order.iter().enumerate() {
            decls.push(SimpleExtensionDeclaration::ExtensionFunction(
                ExtensionFunctionDecl {
                    extension_uri_reference: uri_anchor(&f.uri),
                    function_anchor: i as u32 + 1,
                    name: f.key.clone(),
                },
            ));
        }
        for (i, t) in self.type_order.iter().enumerate() {
            decls.push(SimpleExtensionDeclaration::ExtensionType(ExtensionTypeDecl {
                extension_uri_reference: uri_anchor(&t.uri),
                type_anchor: i as u32 + 1,
                name: t.name.clone(),
            }));
        }
        (uris, decls)
    }
}
