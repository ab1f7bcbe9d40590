//! Value resolution for injection points.
//!
//! Every injection point resolves its value through one runtime method of
//! the definition base class, chosen by the shape of the target type and its
//! annotations, and addressed by the point's position in the descriptor
//! arrays.

use super::qualifier::{push_qualifier, Qualifier};
use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::Code;
use crate::consts::{annotations, types};
use crate::error::{Error, Result};
use crate::model::{AnnotationMetadata, ClassElement};

/// Local slot of the `BeanResolutionContext` parameter in generated methods
pub const RESOLUTION_CONTEXT_SLOT: u16 = 1;
/// Local slot of the `BeanContext` parameter in generated methods
pub const BEAN_CONTEXT_SLOT: u16 = 2;

const COLLECTION_TYPES: &[&str] = &[
    "java.lang.Iterable",
    "java.util.Collection",
    "java.util.List",
    "java.util.Set",
    "java.util.SortedSet",
    "java.util.NavigableSet",
    "java.util.Queue",
    "java.util.Deque",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Bean,
    BeansOfType,
    /// Beans of the component type, converted to an array
    BeansArray,
    Stream,
    Map,
    Optional,
    Registration,
    Registrations,
    PropertyValue,
    PropertyPlaceholder,
    EvaluatedExpression,
}

impl Resolution {
    /// Picks the strategy for a value of type `t` carrying `metadata`
    pub fn select(t: &ClassElement, metadata: &AnnotationMetadata) -> Self {
        if let Some(value) = metadata.string_value(annotations::VALUE, "value") {
            return if value.contains("#{") {
                Resolution::EvaluatedExpression
            } else {
                Resolution::PropertyPlaceholder
            };
        }
        if metadata.string_value(annotations::PROPERTY, "name").is_some() {
            return Resolution::PropertyValue;
        }
        if t.is_array() {
            return Resolution::BeansArray;
        }
        let first_argument_is_registration = t
            .type_arguments
            .values()
            .next()
            .map_or(false, |a| a.internal_name() == types::BEAN_REGISTRATION);
        match t.internal_name().as_str() {
            _ if COLLECTION_TYPES.contains(&t.name.as_str()) => {
                if first_argument_is_registration {
                    Resolution::Registrations
                } else {
                    Resolution::BeansOfType
                }
            }
            types::STREAM => Resolution::Stream,
            types::MAP => Resolution::Map,
            types::OPTIONAL => Resolution::Optional,
            types::BEAN_REGISTRATION => Resolution::Registration,
            _ => Resolution::Bean,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Resolution::Bean => "getBean",
            Resolution::BeansOfType | Resolution::BeansArray => "getBeansOfType",
            Resolution::Stream => "getStreamOfType",
            Resolution::Map => "getMapOfType",
            Resolution::Optional => "findBean",
            Resolution::Registration => "getBeanRegistration",
            Resolution::Registrations => "getBeanRegistrations",
            Resolution::PropertyValue => "getPropertyValue",
            Resolution::PropertyPlaceholder => "getPropertyPlaceholderValue",
            Resolution::EvaluatedExpression => "getEvaluatedExpressionValue",
        }
    }

    fn return_type(&self) -> JvmType {
        JvmType::object(match self {
            Resolution::BeansOfType | Resolution::BeansArray | Resolution::Registrations => types::COLLECTION,
            Resolution::Stream => types::STREAM,
            Resolution::Map => types::MAP,
            Resolution::Optional => types::OPTIONAL,
            Resolution::Registration => types::BEAN_REGISTRATION,
            _ => types::OBJECT,
        })
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Resolution::PropertyValue | Resolution::PropertyPlaceholder | Resolution::EvaluatedExpression)
    }

    /// Whether a null result can reach the store
    pub fn may_be_null(&self) -> bool {
        matches!(self, Resolution::Bean | Resolution::Registration) || self.is_property()
    }
}

/// Where an injected value goes; indices address the descriptor arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionSite {
    ConstructorArgument { argument: usize },
    Field { field: usize },
    MethodArgument { method: usize, argument: usize },
}

impl InjectionSite {
    fn suffix(&self) -> &'static str {
        match self {
            InjectionSite::ConstructorArgument { .. } => "ConstructorArgument",
            InjectionSite::Field { .. } => "Field",
            InjectionSite::MethodArgument { .. } => "MethodArgument",
        }
    }

    fn push_indices(&self, code: &mut Code<'_>) -> Result<usize> {
        match *self {
            InjectionSite::ConstructorArgument { argument: i } | InjectionSite::Field { field: i } => {
                code.iconst(i as i32)?;
                Ok(1)
            }
            InjectionSite::MethodArgument { method, argument } => {
                code.iconst(method as i32)?;
                code.iconst(argument as i32)?;
                Ok(2)
            }
        }
    }
}

/// One value lookup
#[derive(Debug, Clone)]
pub struct ResolutionCall<'a> {
    pub resolution: Resolution,
    pub site: InjectionSite,
    pub target: &'a ClassElement,
    pub qualifier: &'a Qualifier,
    /// Property name for `PropertyValue`, the raw value for
    /// `PropertyPlaceholder`
    pub property: Option<&'a str>,
}

impl<'a> ResolutionCall<'a> {
    pub fn new(resolution: Resolution, site: InjectionSite, target: &'a ClassElement, qualifier: &'a Qualifier) -> Self {
        Self { resolution, site, target, qualifier, property: None }
    }

    fn needs_coercion(&self) -> bool {
        self.resolution == Resolution::BeansOfType
            && !matches!(self.target.name.as_str(), "java.util.Collection" | "java.lang.Iterable")
    }

    /// Emits the lookup on `owner` (the definition class), leaving the raw
    /// value on the stack. `push_metadata` pushes the injection point's
    /// runtime metadata for by-annotation qualifiers.
    pub fn emit<F>(&self, code: &mut Code<'_>, owner: &str, push_metadata: &mut F) -> Result<()>
    where
        F: FnMut(&mut Code<'_>) -> Result<()>,
    {
        if self.resolution == Resolution::BeansArray && self.target.from_array().is_primitive() {
            return Err(Error::malformed(format!(
                "cannot inject beans into primitive array {}{}",
                self.target.name,
                "[]".repeat(self.target.array_dimensions)
            )));
        }
        let coerce = self.needs_coercion();
        if coerce {
            code.aload(0);
            code.ldc_class(&self.target.jvm_type())?;
        }
        code.aload(0);
        code.aload(RESOLUTION_CONTEXT_SLOT);
        code.aload(BEAN_CONTEXT_SLOT);
        let mut params = vec![JvmType::object(types::BEAN_RESOLUTION_CONTEXT), JvmType::object(types::BEAN_CONTEXT)];
        let indices = self.site.push_indices(code)?;
        params.extend(std::iter::repeat(JvmType::int()).take(indices));
        match self.resolution {
            Resolution::PropertyValue | Resolution::PropertyPlaceholder => {
                code.ldc_string(self.property.unwrap_or_default())?;
                params.push(JvmType::string());
            }
            Resolution::EvaluatedExpression => {}
            _ => {
                push_qualifier(code, self.qualifier, push_metadata)?;
                params.push(JvmType::object(types::QUALIFIER));
            }
        }
        let name = format!("{}For{}", self.resolution.verb(), self.site.suffix());
        code.invokevirtual(owner, &name, &method_descriptor(&params, &self.resolution.return_type()))?;

        if self.resolution == Resolution::BeansArray {
            let component = self.target.from_array().jvm_type().boxed();
            code.iconst(0)?;
            code.anewarray(&component)?;
            let object_array = JvmType::array_of(JvmType::java_object());
            code.invokeinterface(types::COLLECTION, "toArray", &method_descriptor(&[object_array.clone()], &object_array))?;
            code.checkcast(&self.target.jvm_type())?;
        }
        if coerce {
            let desc = method_descriptor(
                &[JvmType::object(types::CLASS), JvmType::object(types::COLLECTION)],
                &JvmType::java_object(),
            );
            code.invokevirtual(owner, "coerceCollectionToCorrectType", &desc)?;
        }
        Ok(())
    }
}

/// The `@Property` name or raw `@Value` of an element, if any
pub fn property_of(metadata: &AnnotationMetadata) -> Option<String> {
    metadata
        .string_value(annotations::VALUE, "value")
        .or_else(|| metadata.string_value(annotations::PROPERTY, "name"))
        .map(str::to_string)
}

/// True when a resolved `null` must skip the store
pub fn is_nullable(metadata: &AnnotationMetadata) -> bool {
    metadata.has_stereotype(annotations::NULLABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotationValue;

    #[test]
    fn test_shape_selection() {
        let empty = AnnotationMetadata::Empty;
        let list = ClassElement::interface("java.util.List").with_type_argument("E", ClassElement::of("a.Svc"));
        assert_eq!(Resolution::select(&list, &empty), Resolution::BeansOfType);
        let regs = ClassElement::interface("java.util.Collection")
            .with_type_argument("E", ClassElement::interface("io.micronaut.context.BeanRegistration"));
        assert_eq!(Resolution::select(&regs, &empty), Resolution::Registrations);
        assert_eq!(Resolution::select(&ClassElement::of("a.Svc").to_array(), &empty), Resolution::BeansArray);
        assert_eq!(Resolution::select(&ClassElement::interface("java.util.stream.Stream"), &empty), Resolution::Stream);
        assert_eq!(Resolution::select(&ClassElement::of("java.util.Optional"), &empty), Resolution::Optional);
        assert_eq!(Resolution::select(&ClassElement::interface("java.util.Map"), &empty), Resolution::Map);
        assert_eq!(Resolution::select(&ClassElement::of("a.Svc"), &empty), Resolution::Bean);
    }

    #[test]
    fn test_value_annotations() {
        let t = ClassElement::of("java.lang.String");
        let placeholder = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::VALUE).with("value", "${app.name}"))
            .build();
        assert_eq!(Resolution::select(&t, &placeholder), Resolution::PropertyPlaceholder);
        let expression = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::VALUE).with("value", "#{ 1 + 1 }"))
            .build();
        assert_eq!(Resolution::select(&t, &expression), Resolution::EvaluatedExpression);
        let property = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::PROPERTY).with("name", "app.port"))
            .build();
        assert_eq!(Resolution::select(&t, &property), Resolution::PropertyValue);
        assert_eq!(property_of(&property).as_deref(), Some("app.port"));
    }

    #[test]
    fn test_nullable_results() {
        assert!(Resolution::Bean.may_be_null());
        assert!(Resolution::PropertyPlaceholder.may_be_null());
        assert!(!Resolution::BeansOfType.may_be_null());
        assert!(!Resolution::BeansArray.may_be_null());
        assert!(!Resolution::Optional.may_be_null());
    }

    #[test]
    fn test_primitive_array_is_not_injectable() {
        use crate::codegen::class::access_flags::{ACC_PUBLIC, ACC_STATIC};
        use crate::codegen::{ClassBuilder, PrimitiveType};

        let ints = ClassElement::primitive(PrimitiveType::Int).to_array();
        assert_eq!(Resolution::select(&ints, &AnnotationMetadata::Empty), Resolution::BeansArray);
        let mut builder = ClassBuilder::new("a/Gen", types::OBJECT, &[], ACC_PUBLIC, 61).unwrap();
        let result = builder.add_method(ACC_STATIC, "m", "()V", |code| {
            let call = ResolutionCall::new(Resolution::BeansArray, InjectionSite::Field { field: 0 }, &ints, &Qualifier::None);
            call.emit(code, "a/Gen", &mut |_: &mut Code<'_>| Ok(()))
        });
        assert!(matches!(result, Err(Error::MalformedModel { .. })));
    }
}
