//! Scoped symbol table.
use smol_str::SmolStr;

use crate::ast::ProcId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// Compile-time integer value.
    Const { value: i64 },
    /// Storage slot within the defining frame.
    Var { offset: usize },
    /// Callable procedure; the entry address is assigned during code
    /// generation, keyed by `id`.
    Proc { id: ProcId, params: usize },
}

impl SymbolKind {
    pub fn name(&self) -> &'static str {
        match self {
            SymbolKind::Const { .. } => "constant",
            SymbolKind::Var { .. } => "variable",
            SymbolKind::Proc { .. } => "procedure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: SmolStr,
    pub kind: SymbolKind,
    /// Nesting level of the declaring block; the main block is level 0.
    pub level: usize,
    /// Line of the declaration.
    pub line: u32,
    pub referenced: bool,
    /// For variables: whether an assignment or `read` has been seen.
    pub assigned: bool,
}

/// One lexical scope: insertion-ordered symbols plus the next free frame
/// offset. Offsets start at 3, after the SL/DL/RA header.
struct Scope {
    symbols: Vec<Symbol>,
    next_offset: usize,
}

/// Stack of scopes, innermost last.
///
/// The semantic analyzer owns the table for the duration of its walk;
/// scopes are pushed on procedure entry and popped on exit, and nothing
/// survives the analysis.
#[derive(Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope {
            symbols: vec![],
            next_offset: 3,
        });
    }

    /// Pop the innermost scope, returning its symbols for end-of-scope
    /// checks such as unused-variable reporting.
    pub fn exit_scope(&mut self) -> Vec<Symbol> {
        match self.scopes.pop() {
            Some(scope) => scope.symbols,
            None => vec![],
        }
    }

    /// Nesting level of the innermost scope.
    pub fn level(&self) -> usize {
        debug_assert!(!self.scopes.is_empty());
        self.scopes.len().saturating_sub(1)
    }

    /// Declare a constant. On a duplicate, returns the line of the
    /// previous declaration.
    pub fn declare_const(&mut self, name: SmolStr, value: i64, line: u32) -> Result<(), u32> {
        let level = self.level();
        self.declare(Symbol {
            name,
            kind: SymbolKind::Const { value },
            level,
            line,
            referenced: false,
            assigned: true,
        })
    }

    /// Declare a variable, consuming the next free offset of the scope.
    ///
    /// `assigned` is preset for parameters, which receive their value at
    /// the call site.
    pub fn declare_var(&mut self, name: SmolStr, line: u32, assigned: bool) -> Result<usize, u32> {
        let level = self.level();
        let offset = self.innermost().next_offset;
        self.declare(Symbol {
            name,
            kind: SymbolKind::Var { offset },
            level,
            line,
            referenced: false,
            assigned,
        })?;
        self.innermost().next_offset += 1;
        Ok(offset)
    }

    /// Declare a procedure in the *current* scope; its body lives one
    /// level further in.
    pub fn declare_proc(
        &mut self,
        name: SmolStr,
        id: ProcId,
        params: usize,
        line: u32,
    ) -> Result<(), u32> {
        let level = self.level();
        self.declare(Symbol {
            name,
            kind: SymbolKind::Proc { id, params },
            level,
            line,
            referenced: false,
            assigned: true,
        })
    }

    fn innermost(&mut self) -> &mut Scope {
        debug_assert!(!self.scopes.is_empty());
        self.scopes.last_mut().expect("no open scope")
    }

    fn declare(&mut self, symbol: Symbol) -> Result<(), u32> {
        let scope = self.innermost();
        if let Some(existing) = scope.symbols.iter().find(|s| s.name == symbol.name) {
            return Err(existing.line);
        }
        scope.symbols.push(symbol);
        Ok(())
    }

    /// Search the scopes from innermost to outermost.
    ///
    /// Returns the symbol and the level difference between the current
    /// level and the symbol's defining level.
    pub fn resolve(&mut self, name: &str) -> Option<(&mut Symbol, usize)> {
        let current = self.level();
        for scope in self.scopes.iter_mut().rev() {
            if let Some(symbol) = scope.symbols.iter_mut().find(|s| s.name == name) {
                let diff = current - symbol.level;
                return Some((symbol, diff));
            }
        }
        None
    }

    /// Whether the name is visible in any *enclosing* scope, i.e. would be
    /// shadowed by a declaration in the current scope.
    pub fn is_shadowing(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .skip(1)
            .any(|scope| scope.symbols.iter().any(|s| s.name == name))
    }

    /// Best spelling correction for an unresolved name.
    ///
    /// The candidate with the smallest edit distance wins, provided the
    /// distance is at most half the name's length and at most 3. Ties go to
    /// the innermost scope, then to the earliest declaration.
    pub fn suggest(&self, name: &str) -> Option<SmolStr> {
        let cap = usize::min(name.chars().count() / 2, 3);
        if cap == 0 {
            return None;
        }

        let mut best: Option<(usize, &SmolStr)> = None;
        for scope in self.scopes.iter().rev() {
            for symbol in &scope.symbols {
                let dist = levenshtein(name, &symbol.name);
                if dist <= cap && best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, &symbol.name));
                }
            }
        }

        best.map(|(_, name)| name.clone())
    }
}

/// Edit distance between two names, computed with a rolling row.
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a.is_empty() {
        return b.chars().count();
    }

    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let insertion = prev[j + 1] + 1;
            let deletion = current[j] + 1;
            let substitution = prev[j] + (ca != cb) as usize;
            current[j + 1] = insertion.min(deletion).min(substitution);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("countr", "counter"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_declare_and_resolve() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_const(SmolStr::new("limit"), 10, 1).unwrap();
        let offset = table.declare_var(SmolStr::new("x"), 2, false).unwrap();
        assert_eq!(offset, 3);

        let (symbol, diff) = table.resolve("x").unwrap();
        assert_eq!(symbol.kind, SymbolKind::Var { offset: 3 });
        assert_eq!(diff, 0);
    }

    #[test]
    fn test_offsets_after_parameters() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.enter_scope();
        // Two parameters, then a local.
        assert_eq!(table.declare_var(SmolStr::new("a"), 1, true).unwrap(), 3);
        assert_eq!(table.declare_var(SmolStr::new("b"), 1, true).unwrap(), 4);
        assert_eq!(table.declare_var(SmolStr::new("t"), 2, false).unwrap(), 5);
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_var(SmolStr::new("x"), 1, false).unwrap();
        assert_eq!(table.declare_var(SmolStr::new("x"), 5, false), Err(1));
        // The failed declaration must not burn an offset.
        assert_eq!(table.declare_var(SmolStr::new("y"), 6, false).unwrap(), 4);
    }

    #[test]
    fn test_shadowing_resolves_innermost() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_var(SmolStr::new("g"), 1, false).unwrap();
        table.enter_scope();
        assert!(table.is_shadowing("g"));
        table.declare_var(SmolStr::new("g"), 3, false).unwrap();

        let (symbol, diff) = table.resolve("g").unwrap();
        assert_eq!(symbol.level, 1);
        assert_eq!(diff, 0);
    }

    #[test]
    fn test_level_difference_across_scopes() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_var(SmolStr::new("a"), 1, false).unwrap();
        table.enter_scope();
        table.enter_scope();

        let (_, diff) = table.resolve("a").unwrap();
        assert_eq!(diff, 2);
    }

    #[test]
    fn test_suggest_close_name() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_var(SmolStr::new("counter"), 1, false).unwrap();
        assert_eq!(table.suggest("countr"), Some(SmolStr::new("counter")));
    }

    #[test]
    fn test_suggest_respects_distance_cap() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_var(SmolStr::new("alpha"), 1, false).unwrap();
        // Distance 4 from "beta"; ⌊4/2⌋ = 2, no candidate.
        assert_eq!(table.suggest("beta"), None);
        // Single-letter names never get suggestions.
        assert_eq!(table.suggest("a"), None);
    }

    #[test]
    fn test_suggest_prefers_innermost_on_ties() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_var(SmolStr::new("value1"), 1, false).unwrap();
        table.enter_scope();
        table.declare_var(SmolStr::new("value2"), 2, false).unwrap();
        // Both candidates are at distance 1; the inner scope wins.
        assert_eq!(table.suggest("value"), Some(SmolStr::new("value2")));
    }

    #[test]
    fn test_exit_scope_returns_symbols() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_var(SmolStr::new("used"), 1, false).unwrap();
        table.declare_var(SmolStr::new("unused"), 2, false).unwrap();
        table.resolve("used").unwrap().0.referenced = true;

        let symbols = table.exit_scope();
        let unused: Vec<_> = symbols.iter().filter(|s| !s.referenced).collect();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].name, "unused");
    }
}
