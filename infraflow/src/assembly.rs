//! Application assembly: every stack of an app, synthesized together and
//! written out as template files plus a manifest.

use crate::config::ServiceLimits;
use crate::errors::{InfraflowError, PipelineValidationError};
use crate::observability::{NoOpTracingEmitter, SpanTimer, SynthSpanAttributes, TracingEmitter};
use crate::pipeline::Pipeline;
use crate::resources::StackDefinition;
use crate::template::{synthesize, synthesize_stack, Template};
use crate::utils::validate_stack_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Version of the manifest layout.
pub const MANIFEST_VERSION: &str = "1";

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What a stack contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackKind {
    /// A delivery pipeline.
    Pipeline,
    /// Plain resources.
    Resources,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pipeline => "pipeline",
            Self::Resources => "resources",
        })
    }
}

#[derive(Debug, Clone)]
enum StackSource {
    Pipeline(Pipeline),
    Resources(StackDefinition),
}

/// One synthesized stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedStack {
    /// Stack name.
    pub name: String,
    /// Stack contents.
    pub kind: StackKind,
    /// Rendered template.
    pub template: Template,
}

impl SynthesizedStack {
    /// Name of the template file, `<Stack>.template.json`.
    #[must_use]
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }
}

/// Manifest entry for one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Stack contents.
    pub kind: StackKind,
    /// Template file name, relative to the manifest.
    pub template_file: String,
    /// SHA-256 of the template file.
    pub digest: String,
    /// Number of resources in the template.
    pub resources: usize,
}

/// Index of an output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Layout version.
    pub version: String,
    /// Application name.
    pub app: String,
    /// Stacks by name.
    pub stacks: BTreeMap<String, ManifestEntry>,
}

/// Every synthesized stack of an app, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudAssembly {
    /// Application name.
    pub app: String,
    /// Synthesized stacks.
    pub stacks: Vec<SynthesizedStack>,
}

impl CloudAssembly {
    /// Looks up a stack by name.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<&SynthesizedStack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// Builds the manifest.
    ///
    /// # Errors
    ///
    /// Fails if a template cannot be rendered.
    pub fn manifest(&self) -> Result<Manifest, InfraflowError> {
        let mut stacks = BTreeMap::new();
        for stack in &self.stacks {
            stacks.insert(
                stack.name.clone(),
                ManifestEntry {
                    kind: stack.kind,
                    template_file: stack.template_file(),
                    digest: stack.template.digest()?,
                    resources: stack.template.resources.len(),
                },
            );
        }
        Ok(Manifest {
            version: MANIFEST_VERSION.to_string(),
            app: self.app.clone(),
            stacks,
        })
    }

    /// Writes each template and the manifest into `out_dir`, creating it if
    /// needed. Existing files with the same names are overwritten.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or if a template cannot be rendered.
    pub fn write_to(&self, out_dir: &Path) -> Result<Manifest, InfraflowError> {
        std::fs::create_dir_all(out_dir)?;

        for stack in &self.stacks {
            let path = out_dir.join(stack.template_file());
            std::fs::write(&path, stack.template.to_json_string()?)?;
            tracing::debug!(stack = %stack.name, path = %path.display(), "Template written");
        }

        let manifest = self.manifest()?;
        let mut rendered = serde_json::to_string_pretty(&manifest)?;
        rendered.push('\n');
        std::fs::write(out_dir.join(MANIFEST_FILE), rendered)?;

        tracing::info!(
            app = %self.app,
            stacks = self.stacks.len(),
            out_dir = %out_dir.display(),
            "Cloud assembly written"
        );
        Ok(manifest)
    }
}

/// An application: named stacks synthesized together.
#[derive(Clone)]
pub struct App {
    name: String,
    limits: ServiceLimits,
    stacks: Vec<(String, StackSource)>,
    emitter: Arc<dyn TracingEmitter>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("limits", &self.limits)
            .field("stacks", &self.stack_names())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Creates an empty app.
    #[must_use]
    pub fn new(name: impl Into<String>, limits: ServiceLimits) -> Self {
        Self {
            name: name.into(),
            limits,
            stacks: Vec::new(),
            emitter: Arc::new(NoOpTracingEmitter),
        }
    }

    /// Routes synthesis spans to `emitter`.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<dyn TracingEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stack names in declaration order.
    #[must_use]
    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// The pipeline declared under `stack`, if any.
    #[must_use]
    pub fn pipeline(&self, stack: &str) -> Option<&Pipeline> {
        self.stacks.iter().find_map(|(name, source)| match source {
            StackSource::Pipeline(pipeline) if name == stack => Some(pipeline),
            _ => None,
        })
    }

    /// All pipelines with their stack names.
    #[must_use]
    pub fn pipelines(&self) -> Vec<(&str, &Pipeline)> {
        self.stacks
            .iter()
            .filter_map(|(name, source)| match source {
                StackSource::Pipeline(pipeline) => Some((name.as_str(), pipeline)),
                StackSource::Resources(_) => None,
            })
            .collect()
    }

    fn push(&mut self, name: &str, source: StackSource) -> Result<(), PipelineValidationError> {
        validate_stack_name(name)?;
        if self.stacks.iter().any(|(existing, _)| existing == name) {
            return Err(PipelineValidationError::malformed_identifier(
                "stack name",
                name,
                &format!("already declared in app '{}'", self.name),
            ));
        }
        self.stacks.push((name.to_string(), source));
        Ok(())
    }

    /// Declares a stack holding `pipeline`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid or duplicate stack name.
    pub fn add_pipeline_stack(&mut self, name: &str, pipeline: Pipeline) -> Result<(), PipelineValidationError> {
        self.push(name, StackSource::Pipeline(pipeline))
    }

    /// Declares a resource stack.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate stack name.
    pub fn add_stack(&mut self, stack: StackDefinition) -> Result<(), PipelineValidationError> {
        let name = stack.name().to_string();
        self.push(&name, StackSource::Resources(stack))
    }

    /// Synthesizes every stack in memory.
    ///
    /// # Errors
    ///
    /// Fails on the first stack that does not validate.
    pub fn synthesize(&self) -> Result<CloudAssembly, InfraflowError> {
        let mut stacks = Vec::with_capacity(self.stacks.len());

        for (name, source) in &self.stacks {
            let kind = match source {
                StackSource::Pipeline(_) => StackKind::Pipeline,
                StackSource::Resources(_) => StackKind::Resources,
            };
            let attributes = SynthSpanAttributes::new()
                .with_app(&self.name)
                .with_stack(name, kind.to_string());
            let span = format!("synth {name}");
            let timer = SpanTimer::start(&span);
            self.emitter.span_start(&span, &attributes.to_attributes());

            let synthesized = match source {
                StackSource::Pipeline(pipeline) => synthesize(pipeline, &self.limits),
                StackSource::Resources(stack) => synthesize_stack(stack),
            };
            let template = match synthesized {
                Ok(template) => template,
                Err(err) => {
                    self.emitter
                        .span_error(&span, &err.to_string(), &attributes.to_attributes());
                    return Err(err.into());
                }
            };

            let attributes = attributes.with_result(template.resources.len(), template.digest()?);
            self.emitter
                .span_end(&span, timer.finish(), &attributes.to_attributes());

            stacks.push(SynthesizedStack {
                name: name.clone(),
                kind,
                template,
            });
        }

        Ok(CloudAssembly {
            app: self.name.clone(),
            stacks,
        })
    }

    /// Synthesizes every stack and writes the result to `out_dir`.
    ///
    /// # Errors
    ///
    /// Fails on validation or I/O errors. Nothing is written if any stack
    /// fails to synthesize.
    pub fn synth(&self, out_dir: impl AsRef<Path>) -> Result<Manifest, InfraflowError> {
        self.synthesize()?.write_to(out_dir.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::reference;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap as Map;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEmitter {
        events: Mutex<Vec<String>>,
    }

    impl TracingEmitter for RecordingEmitter {
        fn span_start(&self, name: &str, _attributes: &Map<String, String>) {
            self.events.lock().unwrap().push(format!("start {name}"));
        }
        fn span_end(&self, name: &str, _duration_ms: f64, attributes: &Map<String, String>) {
            assert!(attributes.contains_key("synth.digest"));
            self.events.lock().unwrap().push(format!("end {name}"));
        }
        fn span_error(&self, name: &str, _error: &str, _attributes: &Map<String, String>) {
            self.events.lock().unwrap().push(format!("error {name}"));
        }
    }

    fn app() -> App {
        reference::app(&AppConfig::default()).unwrap()
    }

    #[test]
    fn test_synth_writes_templates_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = app().synth(dir.path()).unwrap();

        assert_eq!(
            manifest.stacks.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["TestPipelineStack", "TestResourcesStack"]
        );
        for entry in manifest.stacks.values() {
            let bytes = std::fs::read(dir.path().join(&entry.template_file)).unwrap();
            assert_eq!(crate::utils::sha256_hex(&bytes), entry.digest);
        }

        let on_disk: Manifest =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(on_disk, manifest);
    }

    #[test]
    fn test_synth_is_byte_identical() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        app().synth(first.path()).unwrap();
        app().synth(second.path()).unwrap();

        for file in [
            "TestPipelineStack.template.json",
            "TestResourcesStack.template.json",
            MANIFEST_FILE,
        ] {
            assert_eq!(
                std::fs::read(first.path().join(file)).unwrap(),
                std::fs::read(second.path().join(file)).unwrap(),
                "{file}"
            );
        }
    }

    #[test]
    fn test_duplicate_stack_name() {
        let mut app = app();
        let stack = reference::test_resources_stack(&AppConfig::default()).unwrap();
        assert!(app.add_stack(stack).is_err());
    }

    #[test]
    fn test_emitter_sees_every_stack() {
        let emitter = Arc::new(RecordingEmitter::default());
        let assembly = app().with_emitter(emitter.clone()).synthesize().unwrap();
        assert_eq!(assembly.stacks.len(), 2);

        let events = emitter.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start synth TestPipelineStack",
                "end synth TestPipelineStack",
                "start synth TestResourcesStack",
                "end synth TestResourcesStack",
            ]
        );
    }

    #[test]
    fn test_assembly_lookup() {
        let assembly = app().synthesize().unwrap();
        let pipeline = assembly.stack("TestPipelineStack").unwrap();
        assert_eq!(pipeline.kind, StackKind::Pipeline);
        assert!(pipeline.template.outputs.contains_key("PipelineArn"));

        let resources = assembly.stack("TestResourcesStack").unwrap();
        assert_eq!(
            resources.template.outputs.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["TestBucketName", "TestInstanceId", "TestVpcId"]
        );
    }
}
