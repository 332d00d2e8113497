// internal early-return helpers
macro_rules! ok {
    ($expr:expr) => {
        match $expr {
            Ok(rv) => rv,
            Err(err) => return Err(err.into()),
        }
    };
}

macro_rules! some {
    ($expr:expr) => {
        match $expr {
            Some(rv) => rv,
            None => return None,
        }
    };
}

/// Creates a render context from key/value pairs.
///
/// The keys are identifiers, the values anything that serializes:
///
/// ```
/// # use miniblade::context;
/// let ctx = context! {
///     name => "Peter",
///     items => vec![1, 2, 3],
/// };
/// ```
///
/// The resulting value serializes to a map and can be passed directly to
/// [`Engine::render`](crate::Engine::render).
#[macro_export]
macro_rules! context {
    () => {
        $crate::Value::from($crate::value::ValueMap::new())
    };
    ($($key:ident => $value:expr),* $(,)?) => {{
        let mut map = $crate::value::ValueMap::new();
        $(
            map.insert(
                stringify!($key).to_string(),
                $crate::Value::from_serializable(&$value),
            );
        )*
        $crate::Value::from(map)
    }};
}
