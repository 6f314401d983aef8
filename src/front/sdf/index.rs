//! The typed index trie.
//!
//! A [Trie] is a total map from *index paths* (sequences of structural
//! tags) to values. It is the universal container for "one value per
//! scalar leaf of a structured value": flattening a record, tuple, or
//! array type produces a trie of sorts, flattening an expression a trie
//! of expressions, and matching a left-hand side against a right-hand
//! side is a shape-checked simultaneous walk ([Trie::fold2],
//! [Trie::map2]).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

use super::error::{ErrorKind, Result};
use super::expr::Expr;

/// One structural tag of an index path.
#[derive(Clone, Debug)]
pub enum Index {
    /// A record field.
    Record(String),
    /// A tuple position.
    Tuple(usize),
    /// A position in a flattened value list (an argument or equation
    /// slot).
    List(usize),
    /// A known array position.
    ArrayInt(usize),
    /// A symbolic array level; the payload is the size expression.
    ///
    /// The payload is cargo, not key: two `ArrayVar` tags compare equal
    /// whatever their sizes, so a trie holds one symbolic binding per
    /// array level.
    ArrayVar(Expr),
    /// An abstract-type leaf.
    Abstract(String),
}

impl Index {
    fn rank(&self) -> u8 {
        match self {
            Index::Record(_) => 0,
            Index::Tuple(_) => 1,
            Index::List(_) => 2,
            Index::ArrayInt(_) => 3,
            Index::ArrayVar(_) => 4,
            Index::Abstract(_) => 5,
        }
    }

    /// The naming segment this tag contributes when a flattened leaf
    /// becomes a state variable. Symbolic array levels contribute none:
    /// the leaf keeps its array sort.
    pub fn scope_segment(&self) -> Option<String> {
        match self {
            Index::Record(n) => Some(n.clone()),
            Index::Tuple(i) | Index::List(i) | Index::ArrayInt(i) => Some(i.to_string()),
            Index::ArrayVar(_) => None,
            Index::Abstract(n) => Some(n.clone()),
        }
    }

    /// Is this an array tag?
    pub fn is_array(&self) -> bool {
        matches!(self, Index::ArrayInt(_) | Index::ArrayVar(_))
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Index {}

impl PartialOrd for Index {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Index {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| match (self, other) {
            (Index::Record(a), Index::Record(b)) => a.cmp(b),
            (Index::Tuple(a), Index::Tuple(b)) => a.cmp(b),
            (Index::List(a), Index::List(b)) => a.cmp(b),
            (Index::ArrayInt(a), Index::ArrayInt(b)) => a.cmp(b),
            // symbolic array levels are all one key
            (Index::ArrayVar(_), Index::ArrayVar(_)) => Ordering::Equal,
            (Index::Abstract(a), Index::Abstract(b)) => a.cmp(b),
            _ => unreachable!("rank mismatch"),
        })
    }
}

impl Hash for Index {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Index::Record(n) | Index::Abstract(n) => n.hash(state),
            Index::Tuple(i) | Index::List(i) | Index::ArrayInt(i) => i.hash(state),
            Index::ArrayVar(_) => {}
        }
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Index::Record(n) => write!(f, ".{}", n),
            Index::Tuple(i) => write!(f, ".{}", i),
            Index::List(i) => write!(f, "#{}", i),
            Index::ArrayInt(i) => write!(f, "[{}]", i),
            Index::ArrayVar(_) => write!(f, "[*]"),
            Index::Abstract(n) => write!(f, ".{}", n),
        }
    }
}

/// Render a path for diagnostics.
pub fn render_path(path: &[Index]) -> String {
    if path.is_empty() {
        "ε".to_owned()
    } else {
        path.iter().map(|i| i.to_string()).collect()
    }
}

/// Drop array tags from a path.
pub fn filter_array_indices(path: &[Index]) -> Vec<Index> {
    path.iter().filter(|i| !i.is_array()).cloned().collect()
}

/// The naming segments of a path, for state-variable disambiguation.
pub fn scope_of_index(path: &[Index]) -> Vec<String> {
    path.iter().filter_map(|i| i.scope_segment()).collect()
}

/// A map from index paths to values, ordered by path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trie<V> {
    map: BTreeMap<Vec<Index>, V>,
}

impl<V> Default for Trie<V> {
    fn default() -> Self {
        Trie {
            map: BTreeMap::new(),
        }
    }
}

impl<V> Trie<V> {
    /// The empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// A trie holding one value at one path.
    pub fn singleton(path: Vec<Index>, v: V) -> Self {
        let mut t = Self::new();
        t.map.insert(path, v);
        t
    }

    /// A trie holding one value at the empty path.
    pub fn leaf(v: V) -> Self {
        Self::singleton(Vec::new(), v)
    }

    /// Bind `path` to `v`, replacing any previous binding.
    pub fn insert(&mut self, path: Vec<Index>, v: V) -> Option<V> {
        self.map.insert(path, v)
    }

    /// Remove the binding at `path`.
    pub fn remove(&mut self, path: &[Index]) -> Option<V> {
        self.map.remove(path)
    }

    /// The value at exactly `path`.
    pub fn get(&self, path: &[Index]) -> Option<&V> {
        self.map.get(path)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Is the trie empty?
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The bindings, in path order.
    pub fn bindings(&self) -> impl Iterator<Item = (&Vec<Index>, &V)> {
        self.map.iter()
    }

    /// The values, in path order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values()
    }

    /// The paths, in order.
    pub fn keys(&self) -> impl Iterator<Item = &Vec<Index>> {
        self.map.keys()
    }

    /// Consume into bindings, in path order.
    pub fn into_bindings(self) -> impl Iterator<Item = (Vec<Index>, V)> {
        self.map.into_iter()
    }

    /// Fold over bindings in path order.
    pub fn fold<B>(&self, init: B, mut f: impl FnMut(B, &[Index], &V) -> B) -> B {
        self.map.iter().fold(init, |b, (k, v)| f(b, k, v))
    }

    /// Rebuild every value, keeping paths.
    pub fn map<W>(&self, mut f: impl FnMut(&[Index], &V) -> W) -> Trie<W> {
        Trie {
            map: self
                .map
                .iter()
                .map(|(k, v)| (k.clone(), f(k, v)))
                .collect(),
        }
    }

    /// Rebuild every value fallibly, keeping paths.
    pub fn try_map<W>(&self, mut f: impl FnMut(&[Index], &V) -> Result<W>) -> Result<Trie<W>> {
        let mut map = BTreeMap::new();
        for (k, v) in &self.map {
            map.insert(k.clone(), f(k, v)?);
        }
        Ok(Trie { map })
    }

    /// The sub-trie under `prefix`, with the prefix stripped.
    pub fn find_prefix(&self, prefix: &[Index]) -> Trie<V>
    where
        V: Clone,
    {
        Trie {
            map: self
                .map
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k[prefix.len()..].to_vec(), v.clone()))
                .collect(),
        }
    }

    /// Does any binding sit under `prefix`?
    pub fn mem_prefix(&self, prefix: &[Index]) -> bool {
        self.map.keys().any(|k| k.starts_with(prefix))
    }

    /// Re-key every binding under an additional leading tag.
    pub fn with_prefix(self, tag: Index) -> Trie<V> {
        Trie {
            map: self
                .map
                .into_iter()
                .map(|(mut k, v)| {
                    k.insert(0, tag.clone());
                    (k, v)
                })
                .collect(),
        }
    }

    /// Take every binding of `other`.
    pub fn merge(&mut self, other: Trie<V>) {
        self.map.extend(other.map);
    }

    /// The greatest list index at the root, if any.
    pub fn top_max_list_index(&self) -> Option<usize> {
        self.map
            .keys()
            .filter_map(|k| match k.first() {
                Some(Index::List(i)) => Some(*i),
                _ => None,
            })
            .max()
    }

    /// Drop leading list tags from every path. Fails with a shape
    /// mismatch if two bindings collapse onto one path.
    pub fn strip_list_prefix(self) -> Result<Trie<V>> {
        let mut map = BTreeMap::new();
        for (k, v) in self.map {
            let stripped: Vec<Index> = k
                .iter()
                .skip_while(|i| matches!(i, Index::List(_)))
                .cloned()
                .collect();
            if map.insert(stripped.clone(), v).is_some() {
                return Err(ErrorKind::ShapeMismatch {
                    lhs: render_path(&k),
                    rhs: render_path(&stripped),
                }
                .into());
            }
        }
        Ok(Trie { map })
    }

    /// Walk two tries simultaneously. The key sets must be identical, in
    /// the same order; otherwise this is a shape mismatch.
    pub fn fold2<B, W>(
        &self,
        other: &Trie<W>,
        init: B,
        mut f: impl FnMut(B, &[Index], &V, &W) -> Result<B>,
    ) -> Result<B> {
        if self.len() != other.len() {
            return Err(shape_mismatch(self, other));
        }
        let mut acc = init;
        for ((ka, va), (kb, vb)) in self.map.iter().zip(other.map.iter()) {
            if ka != kb {
                return Err(shape_mismatch(self, other));
            }
            acc = f(acc, ka, va, vb)?;
        }
        Ok(acc)
    }

    /// Combine two tries of identical shape, value by value.
    pub fn map2<W, X>(
        &self,
        other: &Trie<W>,
        mut f: impl FnMut(&[Index], &V, &W) -> Result<X>,
    ) -> Result<Trie<X>> {
        let map = self.fold2(other, BTreeMap::new(), |mut acc, k, v, w| {
            acc.insert(k.to_vec(), f(k, v, w)?);
            Ok(acc)
        })?;
        Ok(Trie { map })
    }
}

fn shape_mismatch<V, W>(a: &Trie<V>, b: &Trie<W>) -> super::error::Error {
    let render = |keys: Vec<&Vec<Index>>| {
        keys.iter()
            .map(|k| render_path(k))
            .collect::<Vec<_>>()
            .join(", ")
    };
    ErrorKind::ShapeMismatch {
        lhs: render(a.keys().collect()),
        rhs: render(b.keys().collect()),
    }
    .into()
}

impl<V: Display> Display for Trie<V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} -> {}", render_path(k), v)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    fn path(tags: &[Index]) -> Vec<Index> {
        tags.to_vec()
    }

    #[derive(Clone, Debug)]
    struct Paths(Vec<Vec<Index>>);

    impl Arbitrary for Paths {
        fn arbitrary(g: &mut Gen) -> Self {
            let pool = [
                Index::Record("a".into()),
                Index::Record("b".into()),
                Index::Tuple(0),
                Index::Tuple(1),
                Index::List(0),
                Index::ArrayInt(2),
            ];
            let n = usize::arbitrary(g) % 5;
            Paths(
                (0..n)
                    .map(|_| {
                        let len = usize::arbitrary(g) % 3;
                        (0..len).map(|_| g.choose(&pool).unwrap().clone()).collect()
                    })
                    .collect(),
            )
        }
    }

    fn trie_of(paths: &Paths) -> Trie<u32> {
        let mut t = Trie::new();
        for p in &paths.0 {
            t.insert(p.clone(), 0);
        }
        t
    }

    #[quickcheck]
    fn fold2_succeeds_iff_keys_agree(a: Paths, b: Paths) -> bool {
        let ta = trie_of(&a);
        let tb = trie_of(&b);
        let ok = ta.fold2(&tb, 0usize, |n, _, _, _| Ok(n + 1)).is_ok();
        ok == (ta.keys().collect::<Vec<_>>() == tb.keys().collect::<Vec<_>>())
    }

    #[test]
    fn ordering_by_kind_then_value() {
        assert!(Index::Record("z".into()) < Index::Tuple(0));
        assert!(Index::Tuple(3) < Index::List(0));
        assert!(Index::List(9) < Index::ArrayInt(0));
        assert!(Index::ArrayInt(1) < Index::ArrayInt(2));
        assert!(Index::Record("a".into()) < Index::Record("b".into()));
    }

    #[test]
    fn bindings_in_key_order() {
        let mut t = Trie::new();
        t.insert(path(&[Index::Record("b".into())]), 1);
        t.insert(path(&[Index::Record("a".into())]), 0);
        t.insert(path(&[Index::Tuple(0)]), 2);
        let ks: Vec<String> = t.keys().map(|k| render_path(k)).collect();
        assert_eq!(ks, vec![".a", ".b", ".0"]);
    }

    #[test]
    fn fold2_requires_equal_shapes() {
        let mut a = Trie::new();
        a.insert(path(&[Index::Record("x".into())]), 1);
        a.insert(path(&[Index::Record("y".into())]), 2);
        let mut b = Trie::new();
        b.insert(path(&[Index::Record("x".into())]), 10);
        b.insert(path(&[Index::Record("y".into())]), 20);
        let sum = a
            .fold2(&b, 0, |acc, _, v, w| Ok(acc + v + w))
            .unwrap();
        assert_eq!(sum, 33);

        let mut c = Trie::new();
        c.insert(path(&[Index::Record("x".into())]), 10);
        c.insert(path(&[Index::Record("z".into())]), 20);
        assert!(a.fold2(&c, 0, |acc, _, v, w| Ok(acc + v + w)).is_err());
        let mut d = Trie::new();
        d.insert(path(&[Index::Record("x".into())]), 10);
        assert!(a.fold2(&d, 0, |acc, _, v, w| Ok(acc + v + w)).is_err());
    }

    #[test]
    fn prefixes() {
        let mut t = Trie::new();
        t.insert(
            path(&[Index::Record("r".into()), Index::Record("a".into())]),
            1,
        );
        t.insert(
            path(&[Index::Record("r".into()), Index::Record("b".into())]),
            2,
        );
        t.insert(path(&[Index::Record("s".into())]), 3);
        assert!(t.mem_prefix(&[Index::Record("r".into())]));
        let sub = t.find_prefix(&[Index::Record("r".into())]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get(&[Index::Record("a".into())]), Some(&1));
    }

    #[test]
    fn list_utilities() {
        let mut t = Trie::new();
        t.insert(path(&[Index::List(0), Index::Record("a".into())]), 1);
        t.insert(path(&[Index::List(2)]), 2);
        assert_eq!(t.top_max_list_index(), Some(2));
        let s = t.strip_list_prefix().unwrap();
        assert_eq!(s.get(&[Index::Record("a".into())]), Some(&1));
        assert_eq!(s.get(&[]), Some(&2));

        let mut clash = Trie::new();
        clash.insert(path(&[Index::List(0)]), 1);
        clash.insert(path(&[Index::List(1)]), 2);
        assert!(clash.strip_list_prefix().is_err());
    }

    #[test]
    fn scope_segments() {
        let p = path(&[
            Index::Record("r".into()),
            Index::Tuple(1),
            Index::ArrayInt(3),
        ]);
        assert_eq!(scope_of_index(&p), vec!["r", "1", "3"]);
        assert_eq!(filter_array_indices(&p).len(), 2);
    }
}
