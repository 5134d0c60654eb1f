//! Generic structured encode/decode over a self-describing tree.
//!
//! The tree is `serde_json::Value` (with insertion-ordered objects, so
//! field declaration order survives a save). [`Persist`] is the contract
//! any setting type must satisfy to be codec-compatible:
//!
//! - scalars encode as the matching JSON scalar;
//! - ordered sequences (`Vec`) encode as arrays;
//! - unique-key mappings (`BTreeMap`) encode as arrays of `{"k", "v"}`
//!   pairs — never as native JSON object keys, so keys stay unrestricted
//!   in type;
//! - sets (`BTreeSet`) encode in the same list-of-values shape and are
//!   deduplicated on load;
//! - the ownership wrapper (`Option`) encodes absent as `null` and leaves
//!   the default in place when loading a `null`/absent node;
//! - the reactive wrapper (`Var`) is transparent: it encodes and decodes
//!   its underlying value directly.
//!
//! Loading is *into* an existing value, so an absent optional or an
//! untouched field keeps its compiled-in default. Any scalar type
//! mismatch is a [`PrefsError::Decode`]; the caller treats that as a
//! whole-file load failure.

use std::collections::{BTreeMap, BTreeSet};

use gestured_reactive::Var;
use serde_json::{Map, Value};

use crate::error::PrefsError;

/// Contract between setting types and the structured codecs.
pub trait Persist {
    fn store(&self, out: &mut Value);
    fn load(&mut self, node: &Value) -> Result<(), PrefsError>;
}

/// Look up a named child of an object node.
pub(crate) fn child<'a>(node: &'a Value, name: &str) -> Result<&'a Value, PrefsError> {
    node.get(name)
        .ok_or_else(|| PrefsError::decode(format!("missing field '{name}'")))
}

/// Encode `value` under `name` in an object under construction.
pub(crate) fn put_field(fields: &mut Map<String, Value>, name: &str, value: &impl Persist) {
    let mut node = Value::Null;
    value.store(&mut node);
    fields.insert(name.to_string(), node);
}

impl Persist for bool {
    fn store(&self, out: &mut Value) {
        *out = Value::Bool(*self);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        *self = node
            .as_bool()
            .ok_or_else(|| PrefsError::decode("expected a boolean"))?;
        Ok(())
    }
}

impl Persist for i32 {
    fn store(&self, out: &mut Value) {
        *out = Value::from(*self);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        let wide = node
            .as_i64()
            .ok_or_else(|| PrefsError::decode("expected an integer"))?;
        *self = i32::try_from(wide)
            .map_err(|_| PrefsError::decode(format!("integer {wide} out of range")))?;
        Ok(())
    }
}

impl Persist for u32 {
    fn store(&self, out: &mut Value) {
        *out = Value::from(*self);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        let wide = node
            .as_u64()
            .ok_or_else(|| PrefsError::decode("expected an unsigned integer"))?;
        *self = u32::try_from(wide)
            .map_err(|_| PrefsError::decode(format!("integer {wide} out of range")))?;
        Ok(())
    }
}

impl Persist for f64 {
    fn store(&self, out: &mut Value) {
        *out = Value::from(*self);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        // as_f64 also accepts integer nodes
        *self = node
            .as_f64()
            .ok_or_else(|| PrefsError::decode("expected a number"))?;
        Ok(())
    }
}

impl Persist for String {
    fn store(&self, out: &mut Value) {
        *out = Value::String(self.clone());
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        *self = node
            .as_str()
            .ok_or_else(|| PrefsError::decode("expected a string"))?
            .to_string();
        Ok(())
    }
}

fn as_array(node: &Value) -> Result<&Vec<Value>, PrefsError> {
    node.as_array()
        .ok_or_else(|| PrefsError::decode("expected a list"))
}

impl<T: Persist + Default> Persist for Vec<T> {
    fn store(&self, out: &mut Value) {
        let mut items = Vec::with_capacity(self.len());
        for v in self {
            let mut node = Value::Null;
            v.store(&mut node);
            items.push(node);
        }
        *out = Value::Array(items);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        self.clear();
        for item in as_array(node)? {
            let mut v = T::default();
            v.load(item)?;
            self.push(v);
        }
        Ok(())
    }
}

impl<T: Persist + Default + Ord> Persist for BTreeSet<T> {
    fn store(&self, out: &mut Value) {
        let mut items = Vec::with_capacity(self.len());
        for v in self {
            let mut node = Value::Null;
            v.store(&mut node);
            items.push(node);
        }
        *out = Value::Array(items);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        self.clear();
        for item in as_array(node)? {
            let mut v = T::default();
            v.load(item)?;
            self.insert(v);
        }
        Ok(())
    }
}

impl<K, V> Persist for BTreeMap<K, V>
where
    K: Persist + Default + Ord,
    V: Persist + Default,
{
    fn store(&self, out: &mut Value) {
        let mut items = Vec::with_capacity(self.len());
        for (k, v) in self {
            let mut fields = Map::new();
            put_field(&mut fields, "k", k);
            put_field(&mut fields, "v", v);
            items.push(Value::Object(fields));
        }
        *out = Value::Array(items);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        self.clear();
        for item in as_array(node)? {
            let mut k = K::default();
            k.load(child(item, "k")?)?;
            let mut v = V::default();
            v.load(child(item, "v")?)?;
            // duplicate keys: last entry wins
            self.insert(k, v);
        }
        Ok(())
    }
}

impl<T: Persist + Default> Persist for Option<T> {
    fn store(&self, out: &mut Value) {
        match self {
            None => *out = Value::Null,
            Some(v) => v.store(out),
        }
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        if node.is_null() {
            return Ok(());
        }
        let mut v = T::default();
        v.load(node)?;
        *self = Some(v);
        Ok(())
    }
}

impl<T: Persist + Clone + PartialEq + 'static> Persist for Var<T> {
    fn store(&self, out: &mut Value) {
        self.with(|v| v.store(out));
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        let mut v = self.get();
        v.load(node)?;
        self.set(v);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(v: &impl Persist) -> Value {
        let mut node = Value::Null;
        v.store(&mut node);
        node
    }

    #[test]
    fn scalar_type_mismatch_is_an_error() {
        let mut b = false;
        assert!(b.load(&json!("yes")).is_err());
        let mut n = 0i32;
        assert!(n.load(&json!(true)).is_err());
        let mut s = String::new();
        assert!(s.load(&json!(3)).is_err());
    }

    #[test]
    fn integer_range_is_checked() {
        let mut n = 0i32;
        assert!(n.load(&json!(i64::from(i32::MAX) + 1)).is_err());
        let mut u = 0u32;
        assert!(u.load(&json!(u64::from(u32::MAX) + 1)).is_err());
    }

    #[test]
    fn float_accepts_integer_nodes() {
        let mut x = 0.0f64;
        x.load(&json!(3)).unwrap();
        assert_eq!(x, 3.0);
    }

    #[test]
    fn map_encodes_as_kv_pair_list() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), 1i32);
        m.insert("b".to_string(), 2i32);
        assert_eq!(
            encode(&m),
            json!([{"k": "a", "v": 1}, {"k": "b", "v": 2}])
        );

        let mut back: BTreeMap<String, i32> = BTreeMap::new();
        back.load(&encode(&m)).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn map_duplicate_keys_last_wins() {
        let mut m: BTreeMap<String, i32> = BTreeMap::new();
        m.load(&json!([{"k": "x", "v": 1}, {"k": "x", "v": 2}]))
            .unwrap();
        assert_eq!(m.get("x"), Some(&2));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn set_deduplicates_on_load() {
        let mut s: BTreeSet<String> = BTreeSet::new();
        s.load(&json!(["dev", "dev", "tablet"])).unwrap();
        assert_eq!(s.len(), 2);
        assert!(s.contains("tablet"));
    }

    #[test]
    fn option_absent_keeps_default() {
        let mut opt: Option<i32> = None;
        opt.load(&Value::Null).unwrap();
        assert_eq!(opt, None);

        opt.load(&json!(5)).unwrap();
        assert_eq!(opt, Some(5));

        // null again does not clear an already-present value; the caller
        // starts from a fresh default when that matters
        opt.load(&Value::Null).unwrap();
        assert_eq!(opt, Some(5));
    }

    #[test]
    fn var_is_transparent() {
        let v = Var::new(10i32);
        assert_eq!(encode(&v), json!(10));

        let mut target = Var::new(0i32);
        target.load(&json!(7)).unwrap();
        assert_eq!(target.get(), 7);
    }
}
