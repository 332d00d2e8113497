use crate::value::{Value, ValueMap};

/// A layered lookup scope for render variables.
///
/// The base layer holds host supplied data merged with engine globals.
/// Includes, component invocations and loop iterations push fresh child
/// layers which are popped when that invocation's rendering completes.
/// Lookups search innermost to outermost.
#[derive(Debug, Clone, Default)]
pub struct Context {
    layers: Vec<ValueMap>,
}

impl Context {
    /// Creates a context from a base layer.
    pub fn new(base: ValueMap) -> Context {
        Context { layers: vec![base] }
    }

    /// Pushes a fresh layer.
    pub fn push_layer(&mut self, layer: ValueMap) {
        self.layers.push(layer);
    }

    /// Pops the innermost layer again.
    pub fn pop_layer(&mut self) {
        debug_assert!(self.layers.len() > 1, "cannot pop the base layer");
        self.layers.pop();
    }

    /// Binds a name in the innermost layer.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(layer) = self.layers.last_mut() {
            layer.insert(name.into(), value);
        }
    }

    /// Looks a name up, innermost layer first.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.get(name) {
                return Some(value.clone());
            }
        }
        None
    }

    /// Flattens all layers into a single map, innermost bindings winning.
    ///
    /// Used to snapshot the scope for lambda captures and child renders.
    pub fn flatten(&self) -> ValueMap {
        let mut rv = ValueMap::new();
        for layer in &self.layers {
            for (key, value) in layer {
                rv.insert(key.clone(), value.clone());
            }
        }
        rv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layering() {
        let mut base = ValueMap::new();
        base.insert("a".into(), Value::from(1));
        base.insert("b".into(), Value::from(2));
        let mut ctx = Context::new(base);

        let mut layer = ValueMap::new();
        layer.insert("b".into(), Value::from(20));
        ctx.push_layer(layer);

        assert_eq!(ctx.lookup("a"), Some(Value::from(1)));
        assert_eq!(ctx.lookup("b"), Some(Value::from(20)));

        ctx.pop_layer();
        assert_eq!(ctx.lookup("b"), Some(Value::from(2)));
    }
}
