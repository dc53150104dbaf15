//! Atom labels for exchange-constant tables.

use std::collections::HashMap;

use periodic_table;

/// A struct storing a look-up of atomic numbers to give element symbols.
pub struct ElementMap<'a> {
    /// A [`HashMap`] from an atomic number to the element symbol.
    pub map: HashMap<u32, &'a str>,
}

impl Default for ElementMap<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementMap<'static> {
    /// Creates a new [`ElementMap`] for all elements in the periodic table.
    #[must_use]
    pub fn new() -> ElementMap<'static> {
        let mut map = HashMap::new();
        for element in periodic_table::periodic_table() {
            map.insert(element.atomic_number, element.symbol);
        }
        ElementMap { map }
    }
}

impl<'a> ElementMap<'a> {
    /// Returns the element symbol for an atomic number, if there is one.
    pub fn symbol(&self, atomic_number: u32) -> Option<&'a str> {
        self.map.get(&atomic_number).copied()
    }
}

/// Builds the label of a site as shown in exchange-constant tables.
///
/// # Arguments
///
/// * `index` - The on-disk atom label (atom index, or atom-type index for older files).
/// * `symbol` - The element symbol of the site, if the container provides atomic numbers.
///
/// # Returns
///
/// The label, *e.g.* `Fe-1`, or just `1` without a symbol.
pub fn site_label(index: usize, symbol: Option<&str>) -> String {
    match symbol {
        Some(symbol) => format!("{symbol}-{index}"),
        None => format!("{index}"),
    }
}
