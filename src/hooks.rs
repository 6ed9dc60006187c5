//! Hook Registry
//!
//! Lists of shell function names invoked at fixed lifecycle points:
//! - `precmd`  - before the prompt is shown
//! - `preexec` - before each user command runs
//! - `chpwd`   - after the working directory changes
//!
//! Hooks run in registration order; a failing hook is reported but never
//! aborts the surrounding operation.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookType {
    Precmd,
    Preexec,
    Chpwd,
}

impl HookType {
    pub fn parse(name: &str) -> Option<HookType> {
        match name {
            "precmd" => Some(HookType::Precmd),
            "preexec" => Some(HookType::Preexec),
            "chpwd" => Some(HookType::Chpwd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::Precmd => "precmd",
            HookType::Preexec => "preexec",
            HookType::Chpwd => "chpwd",
        }
    }

    pub fn all() -> [HookType; 3] {
        [HookType::Precmd, HookType::Preexec, HookType::Chpwd]
    }
}

#[derive(Debug, Default)]
pub struct Hooks {
    precmd: Vec<String>,
    preexec: Vec<String>,
    chpwd: Vec<String>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_mut(&mut self, kind: HookType) -> &mut Vec<String> {
        match kind {
            HookType::Precmd => &mut self.precmd,
            HookType::Preexec => &mut self.preexec,
            HookType::Chpwd => &mut self.chpwd,
        }
    }

    pub fn list(&self, kind: HookType) -> &[String] {
        match kind {
            HookType::Precmd => &self.precmd,
            HookType::Preexec => &self.preexec,
            HookType::Chpwd => &self.chpwd,
        }
    }

    /// Register a function; duplicate registrations are ignored.
    pub fn add(&mut self, kind: HookType, function: &str) {
        let list = self.list_mut(kind);
        if !list.iter().any(|f| f == function) {
            list.push(function.to_string());
        }
    }

    /// Returns false when the function was not registered.
    pub fn remove(&mut self, kind: HookType, function: &str) -> bool {
        let list = self.list_mut(kind);
        let before = list.len();
        list.retain(|f| f != function);
        list.len() != before
    }

    pub fn clear(&mut self, kind: HookType) {
        self.list_mut(kind).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_preserves_order() {
        let mut hooks = Hooks::new();
        hooks.add(HookType::Precmd, "first");
        hooks.add(HookType::Precmd, "second");
        hooks.add(HookType::Precmd, "first");
        assert_eq!(hooks.list(HookType::Precmd), &["first", "second"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut hooks = Hooks::new();
        hooks.add(HookType::Chpwd, "f");
        assert!(hooks.remove(HookType::Chpwd, "f"));
        assert!(!hooks.remove(HookType::Chpwd, "f"));
        hooks.add(HookType::Preexec, "g");
        hooks.clear(HookType::Preexec);
        assert!(hooks.list(HookType::Preexec).is_empty());
    }

    #[test]
    fn test_parse() {
        assert_eq!(HookType::parse("precmd"), Some(HookType::Precmd));
        assert_eq!(HookType::parse("bogus"), None);
    }
}
