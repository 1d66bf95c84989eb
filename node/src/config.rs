//! JSON configuration persistence (spec.md §6.4, SPEC_FULL.md §11.3): each
//! savable Object exports as `{ "type": ..., "attributes": {name: [Value]} }`;
//! reloading replays these as Factory + `set_attribute` calls.

use crate::registry::RegisteredObject;
use crate::root::Root;
use objects::Factory;
use serde_json::{Map, Value as Json};
use splash_sdk::{Type, Value};
use tracing::warn;
use util::error::{ErrorCode, SplashError, SplashResult};

fn value_to_json(value: &Value) -> Json {
    match value.get_type() {
        Type::Empty => Json::Null,
        Type::Bool => Json::Bool(value.as_bool().unwrap_or(false)),
        Type::Int => Json::Number(value.as_i64().unwrap_or(0).into()),
        Type::Real => serde_json::Number::from_f64(value.as_f64().unwrap_or(0.0)).map(Json::Number).unwrap_or(Json::Null),
        Type::String => Json::String(value.as_string()),
        Type::List => Json::Array(value.as_list().iter().map(value_to_json).collect()),
        Type::Buffer => Json::Array(value.as_buffer().unwrap_or(&[]).iter().map(|b| Json::Number((*b).into())).collect()),
    }
}

fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::empty(),
        Json::Bool(b) => Value::from_bool(*b),
        Json::Number(n) => n.as_i64().map(Value::from_i64).unwrap_or_else(|| Value::from_f64(n.as_f64().unwrap_or(0.0))),
        Json::String(s) => Value::from_string(s.clone()),
        Json::Array(items) => Value::from_list(items.iter().map(json_to_value).collect()),
        Json::Object(_) => Value::empty(),
    }
}

fn object_to_json(entry: &RegisteredObject) -> Json {
    let object = entry.object();
    let mut fields = Map::new();
    fields.insert(
        "type".to_string(),
        Json::String(object.remote_type().unwrap_or_else(|| object.object_type().to_string())),
    );
    let mut attrs = Map::new();
    for name in object.attributes().keys() {
        if let Some(values) = object.get_attribute(name, true, false) {
            attrs.insert(name.clone(), Json::Array(values.iter().map(value_to_json).collect()));
        }
    }
    fields.insert("attributes".to_string(), Json::Object(attrs));
    Json::Object(fields)
}

/// Exports every registered Object on `root` as the §6.4 JSON shape.
pub fn export(root: &Root) -> Json {
    let mut objects = Map::new();
    for entry in root.registry().all() {
        objects.insert(entry.object().name().to_string(), object_to_json(&entry));
    }
    Json::Object(objects)
}

/// Replays a previously exported config: constructs each Object via
/// `factory`, applies its attributes, then registers and replicates it
/// through `root` (spec.md §6.4 "Reloading replays these as set_attribute
/// calls after constructing each Object via the Factory").
pub fn load(root: &Root, factory: &Factory, json: &Json) -> SplashResult<()> {
    let Json::Object(objects) = json else {
        return Err(SplashError::new(ErrorCode::InvalidPath, "config root must be a JSON object"));
    };
    for (name, entry) in objects {
        let Json::Object(fields) = entry else {
            warn!("config: object '{}' entry is not a JSON object, skipping", name);
            continue;
        };
        let Some(Json::String(type_name)) = fields.get("type") else {
            warn!("config: object '{}' has no 'type' field, skipping", name);
            continue;
        };
        let Some(obj) = factory.create(type_name, name) else {
            warn!("config: no factory constructor for type '{}', object '{}' skipped", type_name, name);
            continue;
        };
        if let Some(Json::Object(attrs)) = fields.get("attributes") {
            for (key, value) in attrs {
                let args = match value {
                    Json::Array(items) => items.iter().map(json_to_value).collect(),
                    other => vec![json_to_value(other)],
                };
                obj.set_attribute(key, args);
            }
        }
        root.create_and_replicate(obj);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use objects::Object;
    use std::sync::Arc;
    use util::thread::ShutdownFlag;

    fn factory_with_generic() -> Factory {
        let mut factory = Factory::new();
        factory.register("camera", Arc::new(|name| Arc::new(Object::new(name, "camera"))));
        factory
    }

    #[test]
    fn export_then_load_round_trips_savable_attributes() {
        let root = Root::new("world", factory_with_generic(), ShutdownFlag::new());
        let obj = Arc::new(Object::new("cam1", "camera"));
        obj.set_attribute("zoom", vec![Value::from_f64(2.5)]);
        root.register_object(obj);

        let json = export(&root);
        let reloaded = Root::new("world2", factory_with_generic(), ShutdownFlag::new());
        load(&reloaded, reloaded.factory(), &json).unwrap();

        let entry = reloaded.registry().get("cam1").expect("reloaded");
        assert_eq!(entry.object().get_attribute("zoom", true, true), Some(vec![Value::from_f64(2.5)]));
    }

    #[test]
    fn load_rejects_a_non_object_root() {
        let root = Root::new("world", Factory::new(), ShutdownFlag::new());
        let err = load(&root, root.factory(), &Json::Array(vec![])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPath);
    }

    #[test]
    fn load_skips_objects_with_unregistered_types() {
        let root = Root::new("world", Factory::new(), ShutdownFlag::new());
        let mut fields = Map::new();
        fields.insert("type".to_string(), Json::String("unknown_type".to_string()));
        let mut objects = Map::new();
        objects.insert("x".to_string(), Json::Object(fields));
        load(&root, root.factory(), &Json::Object(objects)).unwrap();
        assert!(root.registry().get("x").is_none());
    }
}
