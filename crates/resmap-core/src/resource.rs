//! Declarative resources.
//!
//! A resource is the validated, in-memory form of one entity as it is sent to
//! or received from a client. Its scalar fields are declared with the same
//! [`FieldInfo`] metadata entities use, so field checks are shared; nested
//! resources and cross-field rules go in [`Resource::clean`].

use crate::error::ValidationError;
use crate::field::FieldInfo;
use crate::validate::validate_field;
use crate::value::Value;

/// Reference to the stored row a resource was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity: &'static str,
    pub pk: i64,
}

impl EntityRef {
    pub const fn new(entity: &'static str, pk: i64) -> Self {
        Self { entity, pk }
    }
}

/// A typed resource with declared scalar fields.
pub trait Resource {
    /// Resource name, used in logs.
    const NAME: &'static str;

    /// Declared scalar fields.
    fn fields() -> &'static [FieldInfo];

    /// Current value of a declared scalar field.
    ///
    /// Returns `None` for names that are not scalar fields of this resource.
    fn field_value(&self, name: &str) -> Option<Value>;

    /// Cross-field and nested checks.
    fn clean(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Validate every declared field, then run [`Resource::clean`].
    ///
    /// Errors are keyed by field name, with cross-field errors under
    /// `__all__`.
    fn full_clean(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        for field in Self::fields() {
            validate_field(field, self.field_value(field.name).as_ref(), &mut errors);
        }
        if let Err(model_errors) = self.clean() {
            errors.merge(model_errors);
        }
        errors.into_result()
    }

    /// Names of the declared scalar fields.
    fn field_names() -> Vec<&'static str> {
        Self::fields().iter().map(|f| f.name).collect()
    }

    /// The stored row this resource was read from, if any.
    fn source_entity(&self) -> Option<&EntityRef> {
        None
    }
}

/// Validate a list of nested resources, reporting failures under `field`.
///
/// Messages are prefixed with the item index (`"1: This field is required."`).
pub fn clean_nested<R: Resource>(field: &'static str, items: &[R], errors: &mut ValidationError) {
    for (index, item) in items.iter().enumerate() {
        if let Err(item_errors) = item.full_clean() {
            for err in item_errors.errors {
                errors.add(
                    field,
                    err.kind,
                    format!("{}.{}: {}", index, err.field, err.message),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NON_FIELD_ERRORS, ValidationErrorKind};
    use crate::field::FieldKind;

    struct Image {
        code: Option<String>,
        original: Option<String>,
    }

    static IMAGE_FIELDS: [FieldInfo; 2] = [
        FieldInfo::new("code", FieldKind::Text).nullable(true),
        FieldInfo::new("original", FieldKind::Text),
    ];

    impl Resource for Image {
        const NAME: &'static str = "ImageResource";

        fn fields() -> &'static [FieldInfo] {
            &IMAGE_FIELDS
        }

        fn field_value(&self, name: &str) -> Option<Value> {
            match name {
                "code" => Some(self.code.clone().into()),
                "original" => Some(self.original.clone().into()),
                _ => None,
            }
        }
    }

    struct Gallery {
        title: String,
        images: Vec<Image>,
    }

    static GALLERY_FIELDS: [FieldInfo; 1] = [FieldInfo::new("title", FieldKind::Text)];

    impl Resource for Gallery {
        const NAME: &'static str = "GalleryResource";

        fn fields() -> &'static [FieldInfo] {
            &GALLERY_FIELDS
        }

        fn field_value(&self, name: &str) -> Option<Value> {
            (name == "title").then(|| Value::from(&self.title))
        }

        fn clean(&self) -> Result<(), ValidationError> {
            let mut errors = ValidationError::new();
            clean_nested("images", &self.images, &mut errors);
            if self.images.len() > 2 {
                errors.add_model_error("at most two images");
            }
            errors.into_result()
        }
    }

    #[test]
    fn test_full_clean_checks_declared_fields() {
        let image = Image {
            code: None,
            original: None,
        };
        let err = image.full_clean().unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "original");
        assert_eq!(Image::field_names(), vec!["code", "original"]);
        assert!(image.source_entity().is_none());
    }

    #[test]
    fn test_nested_errors_are_prefixed() {
        let image = |original: Option<&str>| Image {
            code: None,
            original: original.map(str::to_string),
        };
        let gallery = Gallery {
            title: String::new(),
            images: vec![image(Some("a.jpg")), image(None), image(Some("c.jpg"))],
        };
        let err = gallery.full_clean().unwrap_err();
        let dict = err.message_dict();
        assert_eq!(dict["images"], vec!["1.original: This field is required.".to_string()]);
        assert!(dict.contains_key(NON_FIELD_ERRORS));
        assert!(
            err.errors
                .iter()
                .any(|e| e.field == "title" && e.kind == ValidationErrorKind::Blank)
        );
    }
}
