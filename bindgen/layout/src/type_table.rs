use crate::Layout;
use indexmap::IndexMap;
use std::rc::Rc;

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_DEPTH: usize = 8;

/// Declared struct layouts plus typedef aliases, in declaration order.
#[derive(Debug, Default)]
pub struct TypeTable {
    layouts: IndexMap<String, Rc<Layout>>,
    aliases: IndexMap<String, String>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layout: Layout) -> Rc<Layout> {
        let layout = Rc::new(layout);
        self.layouts.insert(layout.name.clone(), Rc::clone(&layout));
        layout
    }

    pub fn alias(&mut self, name: String, target: String) {
        self.aliases.insert(name, target);
    }

    /// Resolve a struct name, following aliases such as `Texture2D -> Texture`.
    pub fn lookup(&self, name: &str) -> Option<&Rc<Layout>> {
        let mut current = name;
        for _ in 0..MAX_ALIAS_DEPTH {
            if let Some(layout) = self.layouts.get(current) {
                return Some(layout);
            }
            current = self.aliases.get(current)?.as_str();
        }
        None
    }

    /// Every struct and alias name with the layout it resolves to.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Rc<Layout>)> {
        let structs = self.layouts.iter().map(|(name, layout)| (name.as_str(), layout));
        let aliases = self
            .aliases
            .keys()
            .filter_map(|name| self.lookup(name).map(|layout| (name.as_str(), layout)));
        structs.chain(aliases)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
