//! Messages and enums that get a section in the document's appendix.
//!
//! Services only name their request and response messages; everything those
//! messages use has to be listed as well so that field tables can link to it.

use std::collections::BTreeMap;
use std::rc::Rc;

use apidoc_parser::{ApiModel, EnumDefinition, FieldDefinition, FieldKind, StructureDefinition};
use log::debug;

use crate::config::ClosureMode;

#[derive(Debug, Clone, Default)]
pub struct DependencyCache {
    messages: Vec<Rc<StructureDefinition>>,
    enums: Vec<Rc<EnumDefinition>>,
}

impl DependencyCache {
    /// Collects the appendix lists. Both come back sorted by name.
    pub fn load(model: &ApiModel, mode: ClosureMode, payload_marker: &str) -> Self {
        let mut loader = Loader {
            model,
            messages: BTreeMap::new(),
        };

        let mut seeds: Vec<&Rc<StructureDefinition>> = Vec::new();
        if !payload_marker.is_empty() {
            seeds.extend(
                model
                    .structures
                    .values()
                    .filter(|s| s.name.contains(payload_marker)),
            );
        }
        for service in model.services.values() {
            for method in service.methods.values() {
                seeds.push(&method.request);
                seeds.push(&method.response);
            }
        }

        for seed in seeds {
            match mode {
                ClosureMode::Full => loader.walk_full(seed),
                ClosureMode::Shallow => loader.walk_shallow(seed),
            }
        }

        let mut enums: BTreeMap<String, Rc<EnumDefinition>> = BTreeMap::new();
        for message in loader.messages.values() {
            for field in message.fields.values() {
                let types = match mode {
                    ClosureMode::Full => field.referenced_types(),
                    ClosureMode::Shallow => plain_type(field).into_iter().collect(),
                };
                for type_name in types {
                    if let Some(definition) = model.global_enum(type_name)
                        && !enums.contains_key(&definition.name)
                    {
                        debug!("Cache {} as enum dependency of {}", definition.name, message.name);
                        enums.insert(definition.name.clone(), Rc::clone(definition));
                    }
                }
            }
        }

        Self {
            messages: loader.messages.into_values().collect(),
            enums: enums.into_values().collect(),
        }
    }

    pub fn messages(&self) -> &[Rc<StructureDefinition>] {
        &self.messages
    }

    pub fn enums(&self) -> &[Rc<EnumDefinition>] {
        &self.enums
    }

    pub fn contains_message(&self, name: &str) -> bool {
        self.messages.iter().any(|m| m.name == name)
    }
}

/// The type of a plain (not map, not union) field, when it is a custom type.
fn plain_type(field: &FieldDefinition) -> Option<&str> {
    field.declared_type().and_then(|t| t.custom_name())
}

struct Loader<'m> {
    model: &'m ApiModel,
    messages: BTreeMap<String, Rc<StructureDefinition>>,
}

impl<'m> Loader<'m> {
    fn cache(&mut self, message: &Rc<StructureDefinition>) -> bool {
        if self.messages.contains_key(&message.name) {
            return false;
        }
        debug!("Cache {} as message dependency", message.name);
        self.messages.insert(message.name.clone(), Rc::clone(message));
        true
    }

    fn message_of(&self, field: &FieldDefinition) -> Option<&'m Rc<StructureDefinition>> {
        plain_type(field).and_then(|t| self.model.structure(t))
    }

    // ---------------- Full closure ----------------

    fn walk_full(&mut self, message: &Rc<StructureDefinition>) {
        if !self.cache(message) {
            return;
        }
        let model = self.model;
        for field in message.fields.values() {
            for type_name in field.referenced_types() {
                if let Some(next) = model.structure(type_name) {
                    self.walk_full(next);
                }
            }
        }
    }

    // ---------------- Shallow walk ----------------
    //
    // Two message levels below the seed, plus the messages used by the fields
    // of a union alternative. Deeper messages are left out.

    fn walk_shallow(&mut self, seed: &Rc<StructureDefinition>) {
        self.cache(seed);
        for field in seed.fields.values() {
            self.cache_field_type(field);
            if let Some(child) = self.message_of(field) {
                for grandchild in child.fields.values().filter(|f| plain_type(f).is_some()) {
                    self.cache_field_type(grandchild);
                }
            }
        }
    }

    fn cache_field_type(&mut self, field: &FieldDefinition) {
        let model = self.model;
        if let FieldKind::Map { value_type, .. } = &field.kind {
            if let Some(value) = value_type.custom_name().and_then(|t| model.structure(t)) {
                self.cache(value);
            }
            return;
        }
        let Some(message) = self.message_of(field) else {
            return;
        };
        self.cache(message);
        match message.oneof() {
            Some(oneof) => self.cache_message_types(oneof.alternatives()),
            None => self.cache_message_types(message.fields.values()),
        }
    }

    fn cache_message_types<'f>(&mut self, fields: impl IntoIterator<Item = &'f FieldDefinition>) {
        for field in fields {
            if field.is_map() || field.is_oneof() {
                continue;
            }
            if let Some(message) = self.message_of(field) {
                self.cache(message);
                if message.oneof().is_some() {
                    self.cache_oneof_alternatives(message);
                }
            }
        }
    }

    fn cache_oneof_alternatives(&mut self, message: &StructureDefinition) {
        let Some(oneof) = message.oneof() else {
            return;
        };
        for alternative in oneof.alternatives() {
            if let Some(choice) = self.message_of(alternative) {
                for field in choice.fields.values() {
                    if let Some(used) = self.message_of(field) {
                        self.cache(used);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apidoc_parser::{Resolver, read_blocks_from_str};

    fn model(pb: &str, grpc: &str) -> ApiModel {
        let pb = read_blocks_from_str("pb.proto", pb).unwrap();
        let grpc = read_blocks_from_str("grpc.proto", grpc).unwrap();
        let mut resolver = Resolver::new(false);
        resolver.add_definitions(&pb).unwrap();
        resolver.add_definitions(&grpc).unwrap();
        resolver.resolve_services(&grpc).unwrap()
    }

    fn names(cache: &DependencyCache) -> Vec<&str> {
        cache.messages().iter().map(|m| m.name.as_str()).collect()
    }

    const CHAIN: &str = r#"
        enum Level {
            LOW = 0;
        }
        message A {
            B b = 1;
        }
        message B {
            C c = 1;
        }
        message C {
            D d = 1;
        }
        message D {
            Level level = 1;
        }
        message Unused {
            string x = 1;
        }
    "#;

    const SERVICE: &str = r#"
        service Chain {
            rpc Get (GetRequest) returns (GetReply) {
            }
        }
        message GetRequest {
        }
        message GetReply {
            A a = 1;
        }
    "#;

    #[test]
    fn full_closure_follows_every_level() {
        let model = model(CHAIN, SERVICE);
        let cache = DependencyCache::load(&model, ClosureMode::Full, "");
        assert_eq!(names(&cache), vec!["A", "B", "C", "D", "GetReply", "GetRequest"]);
        assert_eq!(cache.enums().len(), 1);
        assert_eq!(cache.enums()[0].name, "Level");
        assert!(!cache.contains_message("Unused"));
    }

    #[test]
    fn shallow_walk_stops_early() {
        let model = model(CHAIN, SERVICE);
        let cache = DependencyCache::load(&model, ClosureMode::Shallow, "");
        assert_eq!(names(&cache), vec!["A", "B", "C", "GetReply", "GetRequest"]);
        assert!(cache.enums().is_empty());
    }

    #[test]
    fn payload_messages_are_always_included() {
        let pb = r#"
            message SepaAccountPayload {
                string iban = 1;
            }
            message ZelleAccountPayload {
                string email = 1;
            }
        "#;
        let service = SERVICE.replace("A a = 1;", "");
        let model = model(pb, &service);
        for mode in [ClosureMode::Full, ClosureMode::Shallow] {
            let cache = DependencyCache::load(&model, mode, "AccountPayload");
            assert_eq!(
                names(&cache),
                vec!["GetReply", "GetRequest", "SepaAccountPayload", "ZelleAccountPayload"]
            );
        }
    }

    #[test]
    fn empty_marker_disables_payload_seeds() {
        let pb = "message SepaAccountPayload {\n}\n";
        let model = model(pb, "");
        assert!(DependencyCache::load(&model, ClosureMode::Full, "").messages().is_empty());
        assert_eq!(
            DependencyCache::load(&model, ClosureMode::Full, "AccountPayload").messages().len(),
            1
        );
    }

    #[test]
    fn union_alternatives_and_map_values() {
        let pb = r#"
            enum Kind {
                K = 0;
            }
            message Holder {
                oneof message {
                    Left left = 1;
                    Right right = 2;
                }
                map<string, Value> values = 3;
            }
            message Left {
                Deep deep = 1;
            }
            message Right {
                Kind kind = 1;
            }
            message Value {
            }
            message Deep {
            }
        "#;
        let grpc = r#"
            service S {
                rpc Get (Req) returns (Rep);
            }
            message Req {
                Holder holder = 1;
            }
            message Rep {
            }
        "#;
        let model = model(pb, grpc);

        let full = DependencyCache::load(&model, ClosureMode::Full, "");
        assert_eq!(
            names(&full),
            vec!["Deep", "Holder", "Left", "Rep", "Req", "Right", "Value"]
        );
        assert_eq!(full.enums()[0].name, "Kind");

        // Neither the map value nor the alternative's own fields are reached.
        let shallow = DependencyCache::load(&model, ClosureMode::Shallow, "");
        assert_eq!(names(&shallow), vec!["Holder", "Left", "Rep", "Req", "Right"]);
        assert_eq!(shallow.enums()[0].name, "Kind");
    }
}
