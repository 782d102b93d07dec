use serde_json::Value;

use super::modpath::ModulePath;

/// A module resolved inside a loaded package.
#[derive(Debug, Clone, PartialEq)]
pub enum Module {
    /// Script source for the host runtime to evaluate.
    Script(Script),
    /// A `.json` source, already parsed.
    Json(Value),
    /// Not part of the package; the host should resolve this name itself.
    External(String),
}

impl Module {
    pub fn kind(&self) -> &'static str {
        match self {
            Module::Script(_) => "script",
            Module::Json(_) => "json",
            Module::External(_) => "external",
        }
    }

    pub fn as_script(&self) -> Option<&Script> {
        match self {
            Module::Script(script) => Some(script),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Name the module was required by.
    pub id: String,
    pub filename: ModulePath,
    pub source: String,
}

impl Script {
    /// Directory that relative requires from this script resolve against.
    pub fn dirname(&self) -> ModulePath {
        self.filename.parent()
    }

    /// Source wrapped in a function expression the host evaluates and calls
    /// as `f(exports, module, __filename, __dirname)`. Inside, `require`
    /// forwards to `module.require`, so the host's module object must carry
    /// a `require` method that routes back into [`super::Package::require_from`].
    pub fn wrapped_source(&self) -> String {
        const HEAD: &str = "(function (exports, module, __filename, __dirname){\
                            var require = function(name) { return module.require(name) };";
        const TAIL: &str = "\n});";
        let mut out = String::with_capacity(HEAD.len() + self.source.len() + TAIL.len());
        out.push_str(HEAD);
        out.push_str(&self.source);
        out.push_str(TAIL);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{Module, Script};

    #[test]
    fn wraps_source_in_function_header() {
        let script = Script {
            id: "m1".into(),
            filename: "module1.js".into(),
            source: "exports.f = function () { return 1; };".into(),
        };
        let wrapped = script.wrapped_source();
        assert_eq!(
            wrapped,
            "(function (exports, module, __filename, __dirname){\
             var require = function(name) { return module.require(name) };\
             exports.f = function () { return 1; };\n});"
        );
    }

    #[test]
    fn dirname_is_parent_of_filename() {
        let script = Script { id: "m3".into(), filename: "module3/lib/g.js".into(), source: String::new() };
        assert_eq!(script.dirname().as_str(), "module3/lib");
        assert_eq!(Module::Script(script).kind(), "script");
    }
}
