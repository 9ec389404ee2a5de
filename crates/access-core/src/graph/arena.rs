//! Arena de grupos: nodos en un vector, referencias por índice `u32`,
//! adyacencia directa e inversa como `Vec<Vec<u32>>`.
//!
//! Los índices se reciclan con una free-list; un slot tombstone (`None`)
//! nunca aparece en listas de adyacencia porque la baja limpia ambas
//! direcciones antes de liberar el slot.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use access_domain::Element;

pub struct GroupArena<G> {
    nodes: Vec<Option<G>>,
    index: BTreeMap<G, u32>,
    forward: Vec<Vec<u32>>,
    reverse: Vec<Vec<u32>>,
    free: Vec<u32>,
}

impl<G: Element> Default for GroupArena<G> {
    fn default() -> Self {
        GroupArena { nodes: Vec::new(), index: BTreeMap::new(), forward: Vec::new(), reverse: Vec::new(), free: Vec::new() }
    }
}

impl<G: Element> GroupArena<G> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, group: &G) -> bool {
        self.index.contains_key(group)
    }

    pub fn id_of(&self, group: &G) -> Option<u32> {
        self.index.get(group).copied()
    }

    pub fn get(&self, id: u32) -> &G {
        self.nodes[id as usize].as_ref().expect("slot vivo")
    }

    /// Inserta un grupo nuevo y devuelve su índice. `None` si ya existía.
    pub fn insert(&mut self, group: G) -> Option<u32> {
        if self.index.contains_key(&group) {
            return None;
        }
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = Some(group.clone());
                id
            }
            None => {
                self.nodes.push(Some(group.clone()));
                self.forward.push(Vec::new());
                self.reverse.push(Vec::new());
                (self.nodes.len() - 1) as u32
            }
        };
        self.index.insert(group, id);
        Some(id)
    }

    /// Elimina un grupo y todas sus aristas incidentes (ambas direcciones).
    /// `false` si no existía.
    pub fn remove(&mut self, group: &G) -> bool {
        let Some(id) = self.index.remove(group) else {
            return false;
        };
        let outgoing = std::mem::take(&mut self.forward[id as usize]);
        for to in outgoing {
            self.reverse[to as usize].retain(|g| *g != id);
        }
        let incoming = std::mem::take(&mut self.reverse[id as usize]);
        for from in incoming {
            self.forward[from as usize].retain(|g| *g != id);
        }
        self.nodes[id as usize] = None;
        self.free.push(id);
        true
    }

    pub fn has_edge(&self, from: u32, to: u32) -> bool {
        self.forward[from as usize].contains(&to)
    }

    /// Agrega la arista `from -> to`. El chequeo de ciclos es del llamador.
    pub fn add_edge(&mut self, from: u32, to: u32) {
        self.forward[from as usize].push(to);
        self.reverse[to as usize].push(from);
    }

    /// Quita la arista `from -> to`. `false` si no existía.
    pub fn remove_edge(&mut self, from: u32, to: u32) -> bool {
        let before = self.forward[from as usize].len();
        self.forward[from as usize].retain(|g| *g != to);
        if self.forward[from as usize].len() == before {
            return false;
        }
        self.reverse[to as usize].retain(|g| *g != from);
        true
    }

    pub fn forward_of(&self, id: u32) -> &[u32] {
        &self.forward[id as usize]
    }

    pub fn reverse_of(&self, id: u32) -> &[u32] {
        &self.reverse[id as usize]
    }

    /// BFS acotada sobre la adyacencia elegida; devuelve lo alcanzable desde
    /// `sources` sin incluirlos (salvo que un ciclo los re-alcance, cosa que
    /// el invariante de aciclicidad impide para `forward`).
    pub fn reach(&self, sources: &[u32], use_reverse: bool) -> Vec<u32> {
        let mut visited = vec![false; self.nodes.len()];
        let mut queue: VecDeque<u32> = VecDeque::new();
        for s in sources {
            if !visited[*s as usize] {
                visited[*s as usize] = true;
                queue.push_back(*s);
            }
        }
        let mut reached = Vec::new();
        while let Some(id) = queue.pop_front() {
            let neighbors = if use_reverse { self.reverse_of(id) } else { self.forward_of(id) };
            for next in neighbors {
                if !visited[*next as usize] {
                    visited[*next as usize] = true;
                    reached.push(*next);
                    queue.push_back(*next);
                }
            }
        }
        reached
    }

    /// `true` si existe un camino dirigido `from ->* to` por aristas directas.
    pub fn reaches(&self, from: u32, to: u32) -> bool {
        if from == to {
            return true;
        }
        self.reach(&[from], false).contains(&to)
    }

    /// Itera los grupos vivos en orden estable (orden del índice).
    pub fn groups(&self) -> impl Iterator<Item = &G> {
        self.index.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_remove_recycles_slots() {
        let mut arena: GroupArena<String> = GroupArena::new();
        let a = arena.insert("a".to_string()).unwrap();
        let _b = arena.insert("b".to_string()).unwrap();
        assert!(arena.insert("a".to_string()).is_none());

        assert!(arena.remove(&"a".to_string()));
        assert!(!arena.contains(&"a".to_string()));
        let c = arena.insert("c".to_string()).unwrap();
        // El slot de "a" se recicla para "c".
        assert_eq!(a, c);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn removal_clears_both_directions() {
        let mut arena: GroupArena<String> = GroupArena::new();
        let a = arena.insert("a".to_string()).unwrap();
        let b = arena.insert("b".to_string()).unwrap();
        let c = arena.insert("c".to_string()).unwrap();
        arena.add_edge(a, b);
        arena.add_edge(c, b);
        arena.add_edge(b, c);

        arena.remove(&"b".to_string());
        assert!(arena.forward_of(a).is_empty());
        assert!(arena.forward_of(c).is_empty());
        assert!(arena.reverse_of(c).is_empty());
    }

    #[test]
    fn reach_is_transitive_and_directed() {
        let mut arena: GroupArena<String> = GroupArena::new();
        let a = arena.insert("a".to_string()).unwrap();
        let b = arena.insert("b".to_string()).unwrap();
        let c = arena.insert("c".to_string()).unwrap();
        arena.add_edge(a, b);
        arena.add_edge(b, c);

        assert!(arena.reaches(a, c));
        assert!(!arena.reaches(c, a));
        let reached = arena.reach(&[a], false);
        assert_eq!(reached, vec![b, c]);
        let reverse = arena.reach(&[c], true);
        assert_eq!(reverse, vec![b, a]);
    }
}
