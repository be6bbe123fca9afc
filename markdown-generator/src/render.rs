use std::collections::BTreeMap;

use apidoc_parser::{ApiModel, EnumDefinition, RpcMethodDefinition, ServiceDefinition, StructureDefinition};
use log::{debug, warn};

use crate::code_examples::CodeExamples;
use crate::config::GeneratorConfig;
use crate::dependency::DependencyCache;
use crate::error::Result;
use crate::table;
use crate::template::TemplateSet;

const LEADING_TEMPLATES: [&str; 5] = [
    "header.md",
    "introduction.md",
    "warnings.md",
    "examples-setup.md",
    "authentication.md",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RpcMessageType {
    Request,
    Response,
}

impl RpcMessageType {
    fn as_str(self) -> &'static str {
        match self {
            RpcMessageType::Request => "Request",
            RpcMessageType::Response => "Response",
        }
    }
}

/// Walks the model in document order and concatenates the filled templates.
pub struct Renderer<'a> {
    model: &'a ApiModel,
    templates: &'a TemplateSet,
    examples: Option<CodeExamples>,
    cache: DependencyCache,
    strict: bool,
}

impl<'a> Renderer<'a> {
    pub fn new(model: &'a ApiModel, templates: &'a TemplateSet, config: &GeneratorConfig) -> Self {
        let examples = config.examples_root.as_ref().and_then(|root| {
            if root.is_dir() {
                Some(CodeExamples::new(root))
            } else {
                warn!("Examples directory {} does not exist", root.display());
                None
            }
        });
        Self {
            model,
            templates,
            examples,
            cache: DependencyCache::load(model, config.closure, &config.payload_marker),
            strict: config.fail_on_missing_documentation,
        }
    }

    pub fn dependencies(&self) -> &DependencyCache {
        &self.cache
    }

    pub fn render(&self) -> Result<String> {
        let mut doc = String::new();
        for name in LEADING_TEMPLATES {
            doc.push_str(&self.templates.fixed(name)?.content());
        }

        for service in self.model.services.values() {
            self.render_service(&mut doc, service)?;
        }

        doc.push_str(&self.templates.fixed("grpc-messages.md")?.content());
        for message in self.cache.messages() {
            self.render_message(&mut doc, message)?;
        }

        doc.push_str(&self.templates.fixed("grpc-enums.md")?.content());
        for definition in self.cache.enums() {
            doc.push_str(&self.render_enum(definition, "global-enum.md")?);
        }

        doc.push_str(&self.templates.fixed("errors.md")?.content());
        Ok(doc)
    }

    fn render_service(&self, doc: &mut String, service: &ServiceDefinition) -> Result<()> {
        debug!("Rendering service {}", service.name);
        let mut vars = BTreeMap::new();
        vars.insert("service.name", service.name.clone());
        vars.insert("service.description", service.description.clone());
        doc.push_str(&self.templates.load("grpc-service.md", vars, self.strict)?.content());

        let mut methods: Vec<&RpcMethodDefinition> = service.methods.values().collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        for method in methods {
            doc.push_str(&self.render_method(method)?);
            self.render_rpc_message(doc, &method.request, RpcMessageType::Request)?;
            self.render_rpc_message(doc, &method.response, RpcMessageType::Response)?;
        }
        Ok(())
    }

    fn render_method(&self, method: &RpcMethodDefinition) -> Result<String> {
        let mut vars = BTreeMap::new();
        vars.insert("method.name", method.name.clone());
        vars.insert("method.description", method.description.clone());
        let template = self.templates.load("rpc-method.md", vars, self.strict)?;

        let examples = match &self.examples {
            Some(examples) => examples.content(&method.name)?,
            None => None,
        };
        match examples {
            Some(examples) => Ok(template.content_with_code_examples(&examples)?),
            None => Ok(template.content()),
        }
    }

    fn render_rpc_message(
        &self,
        doc: &mut String,
        message: &StructureDefinition,
        message_type: RpcMessageType,
    ) -> Result<()> {
        let description = if message.has_fields() {
            message.description.clone()
        } else {
            let suffix = format!("This {} has no parameters.", message_type.as_str());
            if message.description.trim().is_empty() {
                suffix
            } else {
                format!("{}\n{}", message.description, suffix)
            }
        };
        let mut vars = BTreeMap::new();
        vars.insert("rpc.message.type", message_type.as_str().to_string());
        vars.insert("rpc.message.name", message.name.clone());
        vars.insert("rpc.message.description", description);
        doc.push_str(&self.templates.load("rpc-message.md", vars, self.strict)?.content());

        for nested in message.enums.values() {
            doc.push_str(&self.render_enum(nested, "message-enum.md")?);
        }
        if message.has_fields() {
            doc.push_str(&self.render_fields(message)?);
        }
        Ok(())
    }

    fn render_message(&self, doc: &mut String, message: &StructureDefinition) -> Result<()> {
        let mut vars = BTreeMap::new();
        vars.insert("message.name", message.name.clone());
        vars.insert("message.description", message.description.clone());
        doc.push_str(&self.templates.load("message.md", vars, self.strict)?.content());
        if message.has_fields() {
            doc.push_str(&self.render_fields(message)?);
        }
        Ok(())
    }

    fn render_fields(&self, message: &StructureDefinition) -> Result<String> {
        let mut vars = BTreeMap::new();
        vars.insert("field.tbl", table::field_table(message, self.model));
        Ok(self.templates.load("message-fields.md", vars, self.strict)?.content())
    }

    fn render_enum(&self, definition: &EnumDefinition, template: &str) -> Result<String> {
        let mut vars = BTreeMap::new();
        vars.insert("enum.name", definition.name.clone());
        vars.insert("enum.description", definition.description.clone());
        vars.insert("enum.constant.tbl", table::enum_table(definition));
        Ok(self.templates.load(template, vars, self.strict)?.content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerateError;
    use crate::template::TemplateError;
    use apidoc_parser::{Resolver, read_blocks_from_str};

    fn model(pb: &str, grpc: &str) -> ApiModel {
        let pb = read_blocks_from_str("pb.proto", pb).unwrap();
        let grpc = read_blocks_from_str("grpc.proto", grpc).unwrap();
        let mut resolver = Resolver::new(false);
        resolver.add_definitions(&pb).unwrap();
        resolver.add_definitions(&grpc).unwrap();
        resolver.resolve_services(&grpc).unwrap()
    }

    const GRPC: &str = r#"
        // Zebra service.
        service Zebras {
            // Pets a zebra.
            rpc Pet (PetRequest) returns (PetReply) {
            }
            // Feeds a zebra.
            rpc Feed (FeedRequest) returns (FeedReply) {
            }
        }
        // Aardvark service.
        service Aardvarks {
            // Digs.
            rpc Dig (DigRequest) returns (DigReply) {
            }
        }
        message PetRequest {
        }
        message PetReply {
        }
        // What to feed.
        message FeedRequest {
            enum Food {
                GRASS = 0;
            }
            Food food = 1;
        }
        message FeedReply {
            Zebra zebra = 1;
        }
        message DigRequest {
        }
        message DigReply {
        }
        // A zebra.
        message Zebra {
            Mood mood = 1;
        }
        // How a zebra feels.
        enum Mood {
            CALM = 0;
        }
    "#;

    fn render(config: &GeneratorConfig) -> String {
        let model = model("", GRPC);
        let templates = TemplateSet::embedded();
        Renderer::new(&model, &templates, config).render().unwrap()
    }

    fn position(doc: &str, needle: &str) -> usize {
        doc.find(needle).unwrap_or_else(|| panic!("missing {needle:?}"))
    }

    #[test]
    fn sections_follow_document_order() {
        let doc = render(&GeneratorConfig::default());
        let order = [
            "title: API Reference",
            "# Introduction",
            "# Warnings",
            "# Running Example Code",
            "# Authentication",
            "# Service Aardvarks",
            "## RPC Method Dig",
            "# Service Zebras",
            "## RPC Method Feed",
            "### Request Message: FeedRequest",
            "#### Enum: Food",
            "### Response Message: FeedReply",
            "## RPC Method Pet",
            "# gRPC Messages",
            "## Zebra\n",
            "# gRPC Enums",
            "## Mood\n",
            "# Errors",
        ];
        let positions: Vec<usize> = order.iter().map(|n| position(&doc, n)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
    }

    #[test]
    fn empty_messages_have_no_parameters() {
        let doc = render(&GeneratorConfig::default());
        assert!(doc.contains("### Request Message: PetRequest\n\nThis Request has no parameters.\n\n"));
        assert!(doc.contains("### Response Message: PetReply\n\nThis Response has no parameters.\n\n"));
        assert!(doc.contains("### Request Message: FeedRequest\n\nWhat to feed.\n\n"));
    }

    #[test]
    fn fields_link_to_appendix() {
        let doc = render(&GeneratorConfig::default());
        assert!(doc.contains(" zebra | [Zebra](#zebra) |  \n"));
        assert!(doc.contains(" food | Food |  \n"));
        assert!(doc.contains(" mood | [Mood](#mood) |  \n"));
    }

    #[test]
    fn missing_examples_root_is_ignored() {
        let config = GeneratorConfig {
            examples_root: Some("does/not/exist".into()),
            ..GeneratorConfig::default()
        };
        assert!(!render(&config).contains("```shell"));
    }

    #[test]
    fn examples_are_inserted_under_method_header() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cli-examples")).unwrap();
        std::fs::write(dir.path().join("cli-examples/Dig.sh"), "./cli dig\n").unwrap();
        let config = GeneratorConfig {
            examples_root: Some(dir.path().to_path_buf()),
            ..GeneratorConfig::default()
        };
        let doc = render(&config);
        assert!(doc.contains("## RPC Method Dig\n```shell\n./cli dig\n\n```\n\n```java\n```\n```python\n```\n\nDigs.\n\n\n"));
        assert!(!doc.contains("## RPC Method Pet\n```"));
    }

    #[test]
    fn strict_rendering_fails_on_blank_values() {
        let grpc = r#"
            // Documented.
            service S {
                // Documented.
                rpc Get (GetRequest) returns (GetReply) {
                }
            }
            message GetRequest {
                enum Kind {
                    A = 0;
                }
                Kind kind = 1;
            }
            message GetReply {
            }
        "#;
        let model = model("", grpc);
        let templates = TemplateSet::embedded();
        let config = GeneratorConfig {
            fail_on_missing_documentation: true,
            ..GeneratorConfig::default()
        };
        let err = Renderer::new(&model, &templates, &config).render().unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Template(TemplateError::MissingValue { ref variable, .. })
                if variable == "rpc.message.description"
        ));
    }
}
