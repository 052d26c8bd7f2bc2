//! Component definitions - declarative recipes describing how to create, wire, initialize and
//! destroy a component.

use crate::component::{
    Arguments, Constructible, DisposableComponent, InitializingComponent, Parameter,
    PropertyBindable, Value, ValueError, AFTER_PROPERTIES_SET, DESTROY,
};
use crate::instance_provider::{
    ComponentInstanceAnyPtr, ComponentInstancePtr, ErrorPtr, RawInstance, TypeInfo,
};
use derivative::Derivative;
use fxhash::FxHashMap;
use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

pub type ConstructorFn = Arc<dyn Fn(&Arguments) -> Result<RawInstance, ErrorPtr> + Send + Sync>;

pub type FactoryMethodFn =
    Arc<dyn Fn(&ComponentInstanceAnyPtr, &Arguments) -> Result<RawInstance, ErrorPtr> + Send + Sync>;

pub type PropertyBinderFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), &str, &Value) -> Result<(), ErrorPtr> + Send + Sync>;

/// Lifecycle callback operating on a finished (possibly post-processed) instance.
pub type CallbackFn = Arc<dyn Fn(&ComponentInstanceAnyPtr) -> Result<(), ErrorPtr> + Send + Sync>;

/// Decides when instances get reused.
///
/// Note: scope resolution happens at instantiation time, so a singleton depending on a prototype
/// gets a single instance of the prototype for its whole life.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Scope {
    /// One shared instance, created on first request and destroyed with the container.
    #[default]
    Singleton,
    /// New instance on every request. The container does not destroy prototypes.
    Prototype,
}

/// Source of a constructor argument or property value.
#[derive(Clone, Debug)]
pub enum ValueSource {
    /// Literal value used as-is.
    Literal(ComponentInstanceAnyPtr),
    /// Reference to another component by name or alias.
    Reference(String),
}

impl ValueSource {
    pub fn literal<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Literal(ComponentInstancePtr::new(value))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }
}

/// Which parameter an explicit argument applies to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArgumentTarget {
    Index(usize),
    Type(TypeInfo),
    Name(String),
}

/// Explicit argument for a constructor or factory method parameter.
#[derive(Clone, Debug)]
pub struct ArgumentSpec {
    pub target: ArgumentTarget,
    pub value: ValueSource,
}

/// How the raw object gets created.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum Instantiation {
    Constructor(#[derivative(Debug = "ignore")] ConstructorFn),
    /// Calls a method on another component, which is created first and tracked as a dependency.
    FactoryMethod {
        factory_component: String,
        #[derivative(Debug = "ignore")]
        method: FactoryMethodFn,
    },
}

/// Declared parameters, explicit arguments and the instantiation strategy.
#[derive(Clone, Debug)]
pub struct ConstructionRecipe {
    pub parameters: Vec<Parameter>,
    pub arguments: Vec<ArgumentSpec>,
    pub instantiation: Instantiation,
}

/// Definition for a component registered in a definition registry.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ComponentDefinition {
    /// Type produced by the recipe, used for type-based resolution.
    pub type_info: TypeInfo,

    pub scope: Scope,

    /// With multiple components registered for a given type, one of them can be marked as primary
    /// and selected when a single instance is requested.
    pub is_primary: bool,

    /// Lazy singletons are skipped by eager pre-instantiation.
    pub lazy_init: bool,

    pub recipe: ConstructionRecipe,

    pub property_values: FxHashMap<String, ValueSource>,

    #[derivative(Debug = "ignore")]
    pub property_binder: Option<PropertyBinderFn>,

    /// Components which must be fully initialized before this one.
    pub depends_on: Vec<String>,

    pub init_method_name: Option<String>,

    pub destroy_method_name: Option<String>,

    /// Named callbacks which init and destroy method names resolve to.
    #[derivative(Debug(format_with = "fmt_method_names"))]
    pub methods: FxHashMap<String, CallbackFn>,

    /// [InitializingComponent] capability.
    #[derivative(Debug(format_with = "fmt_capability"))]
    pub initializer: Option<CallbackFn>,

    /// [DisposableComponent] capability.
    #[derivative(Debug(format_with = "fmt_capability"))]
    pub disposer: Option<CallbackFn>,
}

fn fmt_method_names(
    methods: &FxHashMap<String, CallbackFn>,
    f: &mut std::fmt::Formatter,
) -> std::fmt::Result {
    f.debug_list().entries(methods.keys()).finish()
}

fn fmt_capability(capability: &Option<CallbackFn>, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{}", capability.is_some())
}

impl ComponentDefinition {
    /// Starts a definition for `T` created by given constructor closure.
    pub fn builder<T, F>(constructor: F) -> ComponentDefinitionBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> Result<T, ErrorPtr> + Send + Sync + 'static,
    {
        ComponentDefinitionBuilder::new(Instantiation::Constructor(Arc::new(
            move |arguments: &Arguments| {
                constructor(arguments).map(|instance| Box::new(instance) as RawInstance)
            },
        )))
    }

    /// Starts a definition for a [Constructible] type, using its declared parameters.
    pub fn constructible<T: Constructible + Send + Sync + 'static>() -> ComponentDefinitionBuilder<T>
    {
        let mut builder = Self::builder(T::construct);
        builder.definition.recipe.parameters = T::parameters();
        builder
    }

    /// Starts a definition for `T` produced by a method of the `factory_component` instance.
    pub fn factory_method<T, C, F>(
        factory_component: impl Into<String>,
        method: F,
    ) -> ComponentDefinitionBuilder<T>
    where
        T: Send + Sync + 'static,
        C: Send + Sync + 'static,
        F: Fn(&C, &Arguments) -> Result<T, ErrorPtr> + Send + Sync + 'static,
    {
        let factory_component = factory_component.into();
        let factory_name = factory_component.clone();

        ComponentDefinitionBuilder::new(Instantiation::FactoryMethod {
            factory_component,
            method: Arc::new(move |factory: &ComponentInstanceAnyPtr, arguments: &Arguments| {
                let factory = factory.downcast_ref::<C>().ok_or_else(|| {
                    Arc::new(ValueError::IncompatibleValue {
                        name: factory_name.clone(),
                        expected: type_name::<C>(),
                    }) as ErrorPtr
                })?;

                method(factory, arguments).map(|instance| Box::new(instance) as RawInstance)
            }),
        })
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    #[inline]
    pub fn is_prototype(&self) -> bool {
        self.scope == Scope::Prototype
    }
}

fn typed_callback<T, F>(name: String, callback: F) -> CallbackFn
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
{
    Arc::new(move |instance: &ComponentInstanceAnyPtr| {
        let instance = instance.downcast_ref::<T>().ok_or_else(|| {
            Arc::new(ValueError::IncompatibleValue {
                name: name.clone(),
                expected: type_name::<T>(),
            }) as ErrorPtr
        })?;

        callback(instance)
    })
}

/// Typed builder for [ComponentDefinition]s.
pub struct ComponentDefinitionBuilder<T> {
    definition: ComponentDefinition,
    _type: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ComponentDefinitionBuilder<T> {
    fn new(instantiation: Instantiation) -> Self {
        Self {
            definition: ComponentDefinition {
                type_info: TypeInfo::of::<T>(),
                scope: Scope::default(),
                is_primary: false,
                lazy_init: false,
                recipe: ConstructionRecipe {
                    parameters: vec![],
                    arguments: vec![],
                    instantiation,
                },
                property_values: Default::default(),
                property_binder: None,
                depends_on: vec![],
                init_method_name: None,
                destroy_method_name: None,
                methods: Default::default(),
                initializer: None,
                disposer: None,
            },
            _type: PhantomData,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.definition.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    pub fn primary(mut self) -> Self {
        self.definition.is_primary = true;
        self
    }

    pub fn lazy_init(mut self) -> Self {
        self.definition.lazy_init = true;
        self
    }

    /// Declares the next constructor parameter.
    pub fn parameter<P: ?Sized + 'static>(mut self, name: impl Into<String>) -> Self {
        self.definition
            .recipe
            .parameters
            .push(Parameter::of::<P>(name));
        self
    }

    pub fn argument(mut self, target: ArgumentTarget, value: ValueSource) -> Self {
        self.definition
            .recipe
            .arguments
            .push(ArgumentSpec { target, value });
        self
    }

    pub fn indexed_argument(self, index: usize, value: ValueSource) -> Self {
        self.argument(ArgumentTarget::Index(index), value)
    }

    pub fn typed_argument<P: ?Sized + 'static>(self, value: ValueSource) -> Self {
        self.argument(ArgumentTarget::Type(TypeInfo::of::<P>()), value)
    }

    pub fn named_argument(self, name: impl Into<String>, value: ValueSource) -> Self {
        self.argument(ArgumentTarget::Name(name.into()), value)
    }

    pub fn property(mut self, name: impl Into<String>, value: ValueSource) -> Self {
        self.definition.property_values.insert(name.into(), value);
        self
    }

    /// Sets the closure which applies resolved property values to a raw instance.
    pub fn property_binder<F>(mut self, binder: F) -> Self
    where
        F: Fn(&mut T, &str, &Value) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        self.definition.property_binder = Some(Arc::new(
            move |instance: &mut (dyn Any + Send + Sync), name: &str, value: &Value| {
                let instance = instance.downcast_mut::<T>().ok_or_else(|| {
                    Arc::new(ValueError::IncompatibleValue {
                        name: name.to_string(),
                        expected: type_name::<T>(),
                    }) as ErrorPtr
                })?;

                binder(instance, name, value)
            },
        ));
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.definition.depends_on.contains(&name) {
            self.definition.depends_on.push(name);
        }

        self
    }

    /// Registers a named callback, without selecting it as init or destroy method.
    pub fn method<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        let name = name.into();
        self.definition
            .methods
            .insert(name.clone(), typed_callback(name, callback));
        self
    }

    /// Selects a method by name. The name is resolved when an instance gets created.
    pub fn init_method_name(mut self, name: impl Into<String>) -> Self {
        self.definition.init_method_name = Some(name.into());
        self
    }

    /// Selects a method by name. The name is resolved when an instance gets destroyed.
    pub fn destroy_method_name(mut self, name: impl Into<String>) -> Self {
        self.definition.destroy_method_name = Some(name.into());
        self
    }

    pub fn init_method<F>(self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        let name = name.into();
        self.method(name.clone(), callback).init_method_name(name)
    }

    pub fn destroy_method<F>(self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        let name = name.into();
        self.method(name.clone(), callback).destroy_method_name(name)
    }

    pub fn build(self) -> ComponentDefinition {
        self.definition
    }
}

impl<T: PropertyBindable + Send + Sync + 'static> ComponentDefinitionBuilder<T> {
    /// Uses [PropertyBindable] to apply property values.
    pub fn bindable(self) -> Self {
        self.property_binder(T::bind_property)
    }
}

impl<T: InitializingComponent + Send + Sync + 'static> ComponentDefinitionBuilder<T> {
    /// Uses [InitializingComponent] as the built-in initialization callback.
    pub fn initializing(mut self) -> Self {
        self.definition.initializer = Some(typed_callback(
            AFTER_PROPERTIES_SET.to_string(),
            T::after_properties_set,
        ));
        self
    }
}

impl<T: DisposableComponent + Send + Sync + 'static> ComponentDefinitionBuilder<T> {
    /// Uses [DisposableComponent] as the built-in destruction callback.
    pub fn disposable(mut self) -> Self {
        self.definition.disposer = Some(typed_callback(DESTROY.to_string(), T::destroy));
        self
    }
}
