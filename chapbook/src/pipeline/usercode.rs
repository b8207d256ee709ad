//! User processor code generator

use tera::{Context, Tera};
use tracing::{debug, info};

use crate::errors::ChapError;
use crate::models::execution::UserCodeArtifact;
use crate::models::pipeline::ProcessorRef;
use crate::storage::layout::{UserLayout, PACKAGE_MARKER};
use crate::utils::sha256_hash;

const PACKAGE_MARKER_CONTENT: &str = "# auto-generated file to load user processors\n";

/// Body indentation of the generated `process` method
const BODY_INDENT: &str = "        ";

const PROCESSOR_TEMPLATE: &str = r#"# auto-generated by chapbook from notebook cells, do not edit
from CHAP import Processor


class {{ processor }}(Processor):
    """{{ processor }} built from {{ user }}'s notebook"""

    def process(self, data):
{%- for line in lines %}
{{ indent }}{{ line }}
{%- endfor %}
{{ indent }}return data
"#;

/// Writes the processor module a pipeline imports for a user
pub struct UserCodeGenerator {
    layout: UserLayout,
}

impl UserCodeGenerator {
    pub fn new(layout: UserLayout) -> Self {
        Self { layout }
    }

    /// Generate `<user>/<workflow>/<module>.py` from notebook cell sources.
    ///
    /// The file is regenerated wholesale on every call.
    pub async fn generate(
        &self,
        processor: &ProcessorRef,
        workflow: &str,
        lines: &[String],
    ) -> Result<UserCodeArtifact, ChapError> {
        let user = processor.user.as_str();

        let user_dir = self.layout.user_dir(user);
        user_dir.create().await?;
        user_dir
            .file(PACKAGE_MARKER)
            .create_if_absent(PACKAGE_MARKER_CONTENT)
            .await?;

        let workflow_dir = self.layout.workflow_dir(user, workflow);
        workflow_dir.create().await?;
        workflow_dir
            .file(PACKAGE_MARKER)
            .create_if_absent(PACKAGE_MARKER_CONTENT)
            .await?;

        let (content, verbatim) = render_processor(processor, lines)?;

        let file = self.layout.processor_file(user, workflow, &processor.module);
        file.overwrite(&content).await.map_err(|e| {
            ChapError::GenerationError(format!(
                "unable to write {}: {}",
                file.path().display(),
                e
            ))
        })?;

        let digest = sha256_hash(content.as_bytes());
        info!(
            "Generated {} for {} ({} cell(s), digest {})",
            file.path().display(),
            user,
            lines.len(),
            &digest[..12]
        );

        Ok(UserCodeArtifact {
            user: user.to_string(),
            workflow: workflow.to_string(),
            module: processor.module.clone(),
            processor: processor.processor.clone(),
            path: file.path().to_path_buf(),
            verbatim,
            digest,
        })
    }
}

/// Processor source for the given cells and whether it was taken verbatim
pub fn render_processor(
    processor: &ProcessorRef,
    lines: &[String],
) -> Result<(String, bool), ChapError> {
    let code = lines.join("\n");
    if defines_class(&code, &processor.processor) {
        debug!(
            "Notebook already defines class {}, writing it as is",
            processor.processor
        );
        return Ok((code, true));
    }

    let indented: Vec<String> = lines
        .iter()
        .map(|line| line.replace('\n', &format!("\n{}", BODY_INDENT)))
        .collect();

    let mut context = Context::new();
    context.insert("processor", &processor.processor);
    context.insert("user", &processor.user);
    context.insert("indent", BODY_INDENT);
    context.insert("lines", &indented);

    let content = Tera::one_off(PROCESSOR_TEMPLATE, &context, false)?;
    Ok((content, false))
}

/// Whether `code` has a module-level `class <name>` statement
fn defines_class(code: &str, name: &str) -> bool {
    code.lines().any(|line| {
        let Some(rest) = line.strip_prefix("class") else {
            return false;
        };
        let declared = rest.trim_start_matches([' ', '\t']);
        if declared.len() == rest.len() {
            return false;
        }
        declared
            .strip_prefix(name)
            .is_some_and(|tail| !tail.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
    })
}
