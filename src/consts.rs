// Names of the runtime types, annotations and generated members that
// definition classes link against. Types are internal (slash separated)
// names, annotations are binary (dotted) names as they appear in metadata.

pub mod types {
    // java.*
    pub const OBJECT: &str = "java/lang/Object";
    pub const STRING: &str = "java/lang/String";
    pub const CLASS: &str = "java/lang/Class";
    pub const THROWABLE: &str = "java/lang/Throwable";
    pub const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";
    pub const METHOD: &str = "java/lang/reflect/Method";
    pub const COLLECTION: &str = "java/util/Collection";
    pub const LIST: &str = "java/util/List";
    pub const SET: &str = "java/util/Set";
    pub const MAP: &str = "java/util/Map";
    pub const OPTIONAL: &str = "java/util/Optional";
    pub const ITERABLE: &str = "java/lang/Iterable";
    pub const STREAM: &str = "java/util/stream/Stream";
    pub const FIELD: &str = "java/lang/reflect/Field";
    pub const CONSTRUCTOR: &str = "java/lang/reflect/Constructor";

    // Kotlin
    pub const DEFAULT_CONSTRUCTOR_MARKER: &str = "kotlin/jvm/internal/DefaultConstructorMarker";

    // Bean definition base classes and their nested reference types
    pub const ABSTRACT_BEAN_DEFINITION: &str = "io/micronaut/context/AbstractInitializableBeanDefinition";
    pub const METHOD_OR_FIELD_REFERENCE: &str =
        "io/micronaut/context/AbstractInitializableBeanDefinition$MethodOrFieldReference";
    pub const METHOD_REFERENCE: &str = "io/micronaut/context/AbstractInitializableBeanDefinition$MethodReference";
    pub const FIELD_REFERENCE: &str = "io/micronaut/context/AbstractInitializableBeanDefinition$FieldReference";
    pub const ANNOTATION_REFERENCE: &str =
        "io/micronaut/context/AbstractInitializableBeanDefinition$AnnotationReference";
    pub const PRECALCULATED_INFO: &str = "io/micronaut/context/AbstractInitializableBeanDefinition$PrecalculatedInfo";
    pub const ABSTRACT_BEAN_DEFINITION_REFERENCE: &str =
        "io/micronaut/context/AbstractInitializableBeanDefinitionReference";
    pub const ABSTRACT_EXECUTABLE_METHODS_DEFINITION: &str = "io/micronaut/context/AbstractExecutableMethodsDefinition";
    pub const EXECUTABLE_METHOD_REFERENCE: &str =
        "io/micronaut/context/AbstractExecutableMethodsDefinition$MethodReference";
    pub const ABSTRACT_EXECUTABLE_METHOD: &str = "io/micronaut/context/AbstractExecutableMethod";

    // Runtime contract
    pub const BEAN_RESOLUTION_CONTEXT: &str = "io/micronaut/context/BeanResolutionContext";
    pub const BEAN_CONTEXT: &str = "io/micronaut/context/BeanContext";
    pub const BEAN_LOCATOR: &str = "io/micronaut/context/BeanLocator";
    pub const BEAN_REGISTRATION: &str = "io/micronaut/context/BeanRegistration";
    pub const DEFAULT_BEAN_CONTEXT: &str = "io/micronaut/context/DefaultBeanContext";
    pub const BEAN_DEFINITION: &str = "io/micronaut/inject/BeanDefinition";
    pub const INITIALIZING_BEAN_DEFINITION: &str = "io/micronaut/inject/InitializingBeanDefinition";
    pub const DISPOSABLE_BEAN_DEFINITION: &str = "io/micronaut/inject/DisposableBeanDefinition";
    pub const ADVISED_BEAN_TYPE: &str = "io/micronaut/inject/AdvisedBeanType";
    pub const EXECUTABLE_METHODS_DEFINITION: &str = "io/micronaut/inject/ExecutableMethodsDefinition";
    pub const EXECUTABLE_METHOD: &str = "io/micronaut/inject/ExecutableMethod";
    pub const ARGUMENT: &str = "io/micronaut/core/type/Argument";
    pub const ANNOTATION_METADATA: &str = "io/micronaut/core/annotation/AnnotationMetadata";
    pub const ANNOTATION_VALUE: &str = "io/micronaut/core/annotation/AnnotationValue";
    pub const ANNOTATION_CLASS_VALUE: &str = "io/micronaut/core/annotation/AnnotationClassValue";
    pub const DEFAULT_ANNOTATION_METADATA: &str = "io/micronaut/inject/annotation/DefaultAnnotationMetadata";
    pub const ANNOTATION_METADATA_SUPPORT: &str = "io/micronaut/inject/annotation/AnnotationMetadataSupport";
    pub const QUALIFIER: &str = "io/micronaut/context/Qualifier";
    pub const QUALIFIERS: &str = "io/micronaut/inject/qualifiers/Qualifiers";
    pub const ANY_QUALIFIER: &str = "io/micronaut/inject/qualifiers/AnyQualifier";
    pub const REFLECTION_UTILS: &str = "io/micronaut/core/reflect/ReflectionUtils";
    pub const INSTANTIATION_UTILS: &str = "io/micronaut/core/reflect/InstantiationUtils";
    pub const ABSTRACT_BEAN_CONSTRUCTOR: &str = "io/micronaut/core/beans/AbstractBeanConstructor";
    pub const BEAN_CONSTRUCTOR: &str = "io/micronaut/core/beans/BeanConstructor";
    pub const INTERCEPTOR_CHAIN: &str = "io/micronaut/aop/chain/InterceptorChain";
    pub const CONSTRUCTOR_INTERCEPTOR_CHAIN: &str = "io/micronaut/aop/chain/ConstructorInterceptorChain";
    pub const METHOD_INTERCEPTOR_CHAIN: &str = "io/micronaut/aop/chain/MethodInterceptorChain";
    pub const INTERCEPTOR: &str = "io/micronaut/aop/Interceptor";
}

pub mod annotations {
    pub const INJECT: &str = "jakarta.inject.Inject";
    pub const NAMED: &str = "jakarta.inject.Named";
    pub const QUALIFIER: &str = "jakarta.inject.Qualifier";
    pub const SINGLETON: &str = "jakarta.inject.Singleton";
    pub const SCOPE: &str = "jakarta.inject.Scope";
    pub const PRIMARY: &str = "io.micronaut.context.annotation.Primary";
    pub const ANY: &str = "io.micronaut.context.annotation.Any";
    pub const TYPE: &str = "io.micronaut.context.annotation.Type";
    pub const VALUE: &str = "io.micronaut.context.annotation.Value";
    pub const PROPERTY: &str = "io.micronaut.context.annotation.Property";
    pub const CONTEXT: &str = "io.micronaut.context.annotation.Context";
    pub const REQUIRES: &str = "io.micronaut.context.annotation.Requires";
    pub const EACH_PROPERTY: &str = "io.micronaut.context.annotation.EachProperty";
    pub const EACH_BEAN: &str = "io.micronaut.context.annotation.EachBean";
    pub const CONFIGURATION_READER: &str = "io.micronaut.context.annotation.ConfigurationReader";
    pub const PARAMETER: &str = "io.micronaut.context.annotation.Parameter";
    pub const INTERCEPTOR_BINDING: &str = "io.micronaut.aop.InterceptorBinding";
    pub const INTERCEPTOR_BINDING_DEFINITIONS: &str = "io.micronaut.aop.InterceptorBindingDefinitions";
    pub const NULLABLE: &str = "io.micronaut.core.annotation.Nullable";
    pub const INJECT_SCOPE: &str = "io.micronaut.context.annotation.InjectScope";
    pub const BEAN: &str = "io.micronaut.context.annotation.Bean";
    pub const EXECUTABLE: &str = "io.micronaut.context.annotation.Executable";
    pub const AROUND: &str = "io.micronaut.aop.Around";
    pub const INTERCEPTOR: &str = "io.micronaut.aop.Interceptor";
}

pub mod names {
    pub const ANNOTATION_METADATA_FIELD: &str = "$ANNOTATION_METADATA";
    pub const CONSTRUCTOR_FIELD: &str = "$CONSTRUCTOR";
    pub const INJECTION_METHODS_FIELD: &str = "$INJECTION_METHODS";
    pub const INJECTION_FIELDS_FIELD: &str = "$INJECTION_FIELDS";
    pub const ANNOTATION_INJECTIONS_FIELD: &str = "$ANNOTATION_INJECTIONS";
    pub const TYPE_ARGUMENTS_FIELD: &str = "$TYPE_ARGUMENTS";
    pub const PRECALCULATED_INFO_FIELD: &str = "$INFO";
    pub const EXPOSED_TYPES_FIELD: &str = "$EXPOSED_TYPES";
    pub const METHODS_REFERENCES_FIELD: &str = "$METHODS_REFERENCES";
    pub const INTERCEPTABLE_FIELD: &str = "$interceptable";
    pub const LOAD_CLASS_VALUE_PREFIX: &str = "$micronaut_load_class_value_";
    pub const PROXY_BRIDGE_PREFIX: &str = "$$access$$";
    pub const KOTLIN_DEFAULT_SUFFIX: &str = "$default";
    pub const DEFINITION_SUFFIX: &str = "$Definition";
    pub const REFERENCE_SUFFIX: &str = "$Reference";
    pub const EXEC_SUFFIX: &str = "$Exec";
    pub const SERVICE_BEAN_DEFINITION_REFERENCE: &str = "io.micronaut.inject.BeanDefinitionReference";
    pub const SERVICE_BEAN_DEFINITION: &str = "io.micronaut.inject.BeanDefinition";
}

// Binary names of types whose beans are treated as containers of other beans
pub const CONTAINER_TYPES: &[&str] = &[
    "java.lang.Iterable",
    "java.util.Collection",
    "java.util.List",
    "java.util.Set",
    "java.util.SortedSet",
    "java.util.NavigableSet",
    "java.util.Queue",
    "java.util.Deque",
    "java.util.stream.Stream",
    "java.util.Optional",
];
