//! Compiled templates and their live instances.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use domc_core::Scope;
use domc_dom::{Document, NodeId};
use tracing::debug;

use crate::analyze::{Analysis, ExtensionPoint, analyze};
use crate::binding::{Binding, NodePath};
use crate::construct;
use crate::error::{CompileError, EvalError};
use crate::registry::{Mounted, Registry, Subtree, SubtreeCompiler, default_registry};
use crate::template_ast::Node;
use crate::template_parse::parse_template;
use crate::update::{self, Snapshot, TemplateId};

/// Compiles a template tree against the default registry.
pub fn compile(node: &Node) -> Result<Template, CompileError> {
    compile_with(node, &default_registry())
}

pub fn compile_with(node: &Node, registry: &Registry) -> Result<Template, CompileError> {
    let analysis = analyze(node, registry)?;
    let id = TemplateId::next();
    debug!(
        ?id,
        bindings = analysis.bindings.len(),
        extensions = analysis.extensions.len(),
        variables = analysis.variables.len(),
        "compiled template"
    );
    Ok(Template {
        inner: Rc::new(Compiled { id, analysis }),
    })
}

/// Parses markup, then compiles it.
pub fn compile_str(markup: &str) -> Result<Template, CompileError> {
    compile(&parse_template(markup)?)
}

struct Compiled {
    id: TemplateId,
    analysis: Analysis,
}

/// Immutable compiled template. Clones share the compiled artifact.
#[derive(Clone)]
pub struct Template {
    inner: Rc<Compiled>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("id", &self.inner.id)
            .field("bindings", &self.inner.analysis.bindings.len())
            .field("variables", &self.inner.analysis.variables)
            .finish()
    }
}

impl Template {
    pub fn id(&self) -> TemplateId {
        self.inner.id
    }

    /// Bindings in declaration (document) order.
    pub fn bindings(&self) -> &[Binding] {
        &self.inner.analysis.bindings
    }

    /// Scope names read by any binding.
    pub fn variables(&self) -> &BTreeSet<String> {
        &self.inner.analysis.variables
    }

    /// Event names the template wires handlers for.
    pub fn events(&self) -> &BTreeSet<String> {
        &self.inner.analysis.events
    }

    /// Scope names the template wires as event handlers.
    pub fn handlers(&self) -> &BTreeSet<String> {
        &self.inner.analysis.handlers
    }

    /// Paths and names of the extension points, in template order.
    pub fn extension_points(&self) -> impl Iterator<Item = (&NodePath, &str)> {
        self.inner
            .analysis
            .extensions
            .iter()
            .map(|ExtensionPoint { path, name, .. }| (path, name.as_str()))
    }

    /// Builds the static tree and returns its root together with the mounted
    /// extension points. Binding values are not applied yet.
    pub fn create(
        &self,
        doc: &Document,
        scope: &Scope,
    ) -> Result<(NodeId, Vec<Box<dyn Mounted>>), EvalError> {
        let built = construct::build(doc, &self.inner.analysis, scope)?;
        Ok((built.root, built.children))
    }

    /// One flat diff pass over this template's bindings for the instance
    /// rooted at `root`. Without a previous snapshot every binding applies.
    /// Extension points are not visited; see [`TemplateInstance::update`].
    pub fn update(
        &self,
        doc: &Document,
        scope: &Scope,
        root: NodeId,
        previous: Option<&Snapshot>,
    ) -> Result<Snapshot, EvalError> {
        update::run(doc, self.inner.id, &self.inner.analysis, scope, root, previous)
    }

    /// Constructs an instance and runs its first update.
    pub fn create_instance(&self, doc: &Document, scope: &Scope) -> Result<TemplateInstance, EvalError> {
        let (root, children) = self.create(doc, scope)?;
        let mut instance = TemplateInstance {
            template: self.clone(),
            root,
            snapshot: None,
            children,
        };
        instance.update(doc, scope)?;
        debug!(id = ?self.inner.id, %root, "created instance");
        Ok(instance)
    }
}

/// A live instance. Dropping it discards the bookkeeping; the nodes stay
/// wherever they were attached until the root is passed to
/// [`Document::release`].
pub struct TemplateInstance {
    template: Template,
    root: NodeId,
    snapshot: Option<Snapshot>,
    children: Vec<Box<dyn Mounted>>,
}

impl fmt::Debug for TemplateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateInstance")
            .field("template", &self.template.inner.id)
            .field("root", &self.root)
            .field("children", &self.children.len())
            .finish()
    }
}

impl TemplateInstance {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Values of the last update pass.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Applies the bindings whose values changed, then forwards the scope to
    /// every mounted extension point.
    pub fn update(&mut self, doc: &Document, scope: &Scope) -> Result<(), EvalError> {
        let next = self
            .template
            .update(doc, scope, self.root, self.snapshot.as_ref())?;
        self.snapshot = Some(next);
        for child in &mut self.children {
            child.update(doc, scope)?;
        }
        Ok(())
    }
}

impl Mounted for TemplateInstance {
    fn node(&self) -> NodeId {
        self.root
    }

    fn update(&mut self, doc: &Document, scope: &Scope) -> Result<(), EvalError> {
        TemplateInstance::update(self, doc, scope)
    }
}

impl Subtree for Template {
    fn create(&self, doc: &Document, scope: &Scope) -> Result<Box<dyn Mounted>, EvalError> {
        Ok(Box::new(self.create_instance(doc, scope)?))
    }
}

/// A template used as a component: `<my-tag>` elements are replaced by an
/// instance of it that sees the enclosing scope.
impl SubtreeCompiler for Template {
    fn compile(
        &self,
        _element: &Node,
        _argument: &str,
        _registry: &Registry,
    ) -> Result<Rc<dyn Subtree>, CompileError> {
        Ok(Rc::new(self.clone()))
    }
}
