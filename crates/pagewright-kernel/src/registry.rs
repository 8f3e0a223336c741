//! Block content registry.
//!
//! Maps each [`BlockKind`] to a [`BlockSchema`] that validates raw JSON into a
//! typed [`BlockContent`] and supplies the kind's default content. The block
//! store only ever calls through this registry, so a new kind needs a content
//! struct, a `BlockContent` variant, and a `register` call, nothing more.
//!
//! Validation is permissive about omitted fields (they take the kind's
//! defaults) and strict about everything else: stray keys, another kind's
//! keys, and wrong JSON shapes are all rejected.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use pagewright_types::{
    BlockContent, BlockKind, GalleryContent, HeroContent, ImageContent, KindContent,
    SliderContent, TextContent,
};

use crate::error::SchemaError;

/// Validator and defaults for one block kind.
pub trait BlockSchema: Send + Sync {
    /// The kind this schema governs.
    fn kind(&self) -> BlockKind;

    /// Top-level keys accepted for this kind.
    fn fields(&self) -> &'static [&'static str];

    /// Validate a raw payload. Omitted fields resolve to defaults.
    fn validate(&self, content: &Value) -> Result<BlockContent, SchemaError>;

    /// Content for a freshly added block.
    fn default_content(&self) -> BlockContent;
}

/// Schema backed by a [`KindContent`] struct's serde definition.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: KindContent> BlockSchema for TypedSchema<T> {
    fn kind(&self) -> BlockKind {
        T::KIND
    }

    fn fields(&self) -> &'static [&'static str] {
        T::FIELDS
    }

    fn validate(&self, content: &Value) -> Result<BlockContent, SchemaError> {
        serde_json::from_value::<T>(content.clone())
            .map(Into::into)
            .map_err(|e| SchemaError::InvalidShape {
                kind: T::KIND,
                message: e.to_string(),
            })
    }

    fn default_content(&self) -> BlockContent {
        T::default().into()
    }
}

/// Kind → schema mapping.
#[derive(Clone)]
pub struct BlockRegistry {
    schemas: BTreeMap<BlockKind, Arc<dyn BlockSchema>>,
}

impl BlockRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            schemas: BTreeMap::new(),
        }
    }

    /// A registry with every built-in kind.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(TypedSchema::<HeroContent>::new());
        registry.register(TypedSchema::<TextContent>::new());
        registry.register(TypedSchema::<ImageContent>::new());
        registry.register(TypedSchema::<GalleryContent>::new());
        registry.register(TypedSchema::<SliderContent>::new());
        registry
    }

    /// Register (or replace) the schema for its kind.
    pub fn register(&mut self, schema: impl BlockSchema + 'static) {
        self.schemas.insert(schema.kind(), Arc::new(schema));
    }

    /// Kinds with a registered schema.
    pub fn kinds(&self) -> impl Iterator<Item = BlockKind> + '_ {
        self.schemas.keys().copied()
    }

    fn schema(&self, kind: BlockKind) -> Result<&Arc<dyn BlockSchema>, SchemaError> {
        self.schemas
            .get(&kind)
            .ok_or(SchemaError::Unregistered(kind))
    }

    /// Validate a raw JSON payload as content of `kind`.
    pub fn validate(&self, kind: BlockKind, content: &Value) -> Result<BlockContent, SchemaError> {
        let schema = self.schema(kind)?;
        let Some(object) = content.as_object() else {
            return Err(SchemaError::NotAnObject { kind });
        };

        // Key check first: gives a precise error before serde's generic one.
        for key in object.keys() {
            if schema.fields().contains(&key.as_str()) {
                continue;
            }
            return Err(match self.owner_of(key, kind) {
                Some(found) => SchemaError::ForeignShape {
                    kind,
                    found,
                    field: key.clone(),
                },
                None => SchemaError::UnknownField {
                    kind,
                    field: key.clone(),
                },
            });
        }

        schema.validate(content)
    }

    /// Validate already-typed content against `kind`.
    pub fn validate_typed(
        &self,
        kind: BlockKind,
        content: BlockContent,
    ) -> Result<BlockContent, SchemaError> {
        self.schema(kind)?;
        if content.kind() != kind {
            return Err(SchemaError::KindMismatch {
                expected: kind,
                got: content.kind(),
            });
        }
        Ok(content)
    }

    /// Default content for `kind`.
    pub fn default_content(&self, kind: BlockKind) -> Result<BlockContent, SchemaError> {
        Ok(self.schema(kind)?.default_content())
    }

    /// Another registered kind that defines `field`.
    fn owner_of(&self, field: &str, except: BlockKind) -> Option<BlockKind> {
        self.schemas
            .values()
            .filter(|s| s.kind() != except)
            .find(|s| s.fields().contains(&field))
            .map(|s| s.kind())
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("kinds", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewright_types::{Alignment, GalleryImage};
    use serde_json::json;

    #[test]
    fn test_builtin_covers_every_kind() {
        let registry = BlockRegistry::builtin();
        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(kinds.len(), BlockKind::ALL.len());
        for kind in BlockKind::ALL {
            assert_eq!(registry.default_content(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn test_empty_payload_equals_default() {
        let registry = BlockRegistry::builtin();
        for kind in BlockKind::ALL {
            assert_eq!(
                registry.validate(kind, &json!({})).unwrap(),
                registry.default_content(kind).unwrap()
            );
        }
    }

    #[test]
    fn test_partial_text_resolves_defaults() {
        let registry = BlockRegistry::builtin();
        let content = registry
            .validate(BlockKind::Text, &json!({"title": "x", "alignment": "center"}))
            .unwrap();
        assert_eq!(
            content,
            BlockContent::Text(TextContent {
                title: Some("x".into()),
                body: Some("Your text here".into()),
                alignment: Alignment::Center,
            })
        );
    }

    #[test]
    fn test_rejects_non_object() {
        let registry = BlockRegistry::builtin();
        assert_eq!(
            registry.validate(BlockKind::Image, &json!(["a"])),
            Err(SchemaError::NotAnObject { kind: BlockKind::Image })
        );
    }

    #[test]
    fn test_rejects_unknown_field() {
        let registry = BlockRegistry::builtin();
        let err = registry
            .validate(BlockKind::Hero, &json!({"title": "t", "colour": "red"}))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownField {
                kind: BlockKind::Hero,
                field: "colour".into()
            }
        );
    }

    #[test]
    fn test_rejects_other_kinds_shape() {
        let registry = BlockRegistry::builtin();
        let err = registry
            .validate(BlockKind::Hero, &json!({"images": [{"url": "a", "alt": "b"}]}))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::ForeignShape {
                kind: BlockKind::Hero,
                found: BlockKind::Gallery,
                field: "images".into()
            }
        );
    }

    #[test]
    fn test_rejects_wrong_primitive_shapes() {
        let registry = BlockRegistry::builtin();
        for (kind, payload) in [
            (BlockKind::Hero, json!({"title": 5})),
            (BlockKind::Text, json!({"alignment": "justify"})),
            (BlockKind::Gallery, json!({"images": {"url": "a"}})),
            (BlockKind::Slider, json!({"slides": [{"title": ["x"]}]})),
        ] {
            let err = registry.validate(kind, &payload).unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidShape { kind: k, .. } if k == kind),
                "{kind}: {err:?}"
            );
        }
    }

    #[test]
    fn test_gallery_preserves_image_order() {
        let registry = BlockRegistry::builtin();
        let content = registry
            .validate(
                BlockKind::Gallery,
                &json!({"images": [{"url": "b", "alt": "2"}, {"url": "a", "alt": "1"}]}),
            )
            .unwrap();
        let BlockContent::Gallery(gallery) = content else {
            panic!("expected gallery");
        };
        assert_eq!(
            gallery.images,
            vec![
                GalleryImage { url: "b".into(), alt: "2".into() },
                GalleryImage { url: "a".into(), alt: "1".into() },
            ]
        );
    }

    #[test]
    fn test_validate_typed_checks_kind() {
        let registry = BlockRegistry::builtin();
        let hero = BlockContent::default_for(BlockKind::Hero);
        assert_eq!(
            registry.validate_typed(BlockKind::Text, hero.clone()),
            Err(SchemaError::KindMismatch {
                expected: BlockKind::Text,
                got: BlockKind::Hero
            })
        );
        assert_eq!(registry.validate_typed(BlockKind::Hero, hero.clone()), Ok(hero));
    }

    #[test]
    fn test_unregistered_kind() {
        let registry = BlockRegistry::empty();
        assert_eq!(
            registry.validate(BlockKind::Text, &json!({})),
            Err(SchemaError::Unregistered(BlockKind::Text))
        );
    }

    #[test]
    fn test_register_replaces_schema() {
        struct StrictImage;
        impl BlockSchema for StrictImage {
            fn kind(&self) -> BlockKind {
                BlockKind::Image
            }
            fn fields(&self) -> &'static [&'static str] {
                &["image_url"]
            }
            fn validate(&self, content: &Value) -> Result<BlockContent, SchemaError> {
                TypedSchema::<ImageContent>::new().validate(content)
            }
            fn default_content(&self) -> BlockContent {
                BlockContent::default_for(BlockKind::Image)
            }
        }

        let mut registry = BlockRegistry::builtin();
        registry.register(StrictImage);
        assert!(registry.validate(BlockKind::Image, &json!({"caption": "c"})).is_err());
        assert!(registry.validate(BlockKind::Image, &json!({"image_url": "u"})).is_ok());
    }
}
