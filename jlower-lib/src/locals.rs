use std::collections::BTreeMap;

use crate::error::{ErrorKind, LowerResult};
use crate::ir::{Local, LocalId};
use crate::method::LocalName;
use crate::types::Type;

/// Hands out registers: one per declared local slot, and a fresh one per spilled stack value.
#[derive(Clone, Debug)]
pub(crate) struct Locals {
    max_locals : u16,
    // index of the next synthesized register; starts past the declared slots
    next_stack : u32,
    by_slot : BTreeMap<u16, LocalId>,
    all : Vec<Local>,
    names : BTreeMap<u16, String>,
}

impl Locals {
    pub fn new(max_locals : u16, declared : &[LocalName]) -> Self {
        let mut names = BTreeMap::new();
        for d in declared {
            // the first declaration of a slot names it
            names.entry(d.index).or_insert_with(|| d.name.clone());
        }
        Locals {
            max_locals,
            next_stack : u32::from(max_locals),
            by_slot : BTreeMap::new(),
            all : Vec::new(),
            names,
        }
    }

    fn create(&mut self, name : String) -> LocalId {
        let id = LocalId(self.all.len() as u32);
        self.all.push(Local { id, name, ty : Type::Unknown });
        id
    }

    /// The register for local slot `index`, created on first use.
    pub fn slot(&mut self, index : u16) -> LowerResult<LocalId> {
        if index >= self.max_locals {
            return Err(ErrorKind::InvalidLocal { index, max : self.max_locals });
        }
        if let Some(&id) = self.by_slot.get(&index) {
            return Ok(id);
        }
        let name = self.names.get(&index).cloned().unwrap_or_else(|| format!("l{}", index));
        let id = self.create(name);
        self.by_slot.insert(index, id);
        Ok(id)
    }

    /// Records the declared type of a receiver or parameter slot.
    pub fn declare(&mut self, index : u16, ty : Type) -> LowerResult<LocalId> {
        let id = self.slot(index)?;
        self.all[id.0 as usize].ty = ty;
        Ok(id)
    }

    /// A new register for a spilled stack value.
    pub fn fresh(&mut self) -> LocalId {
        let name = format!("$stack{}", self.next_stack);
        self.next_stack += 1;
        self.create(name)
    }

    pub fn get(&self, id : LocalId) -> Option<&Local> { self.all.get(id.0 as usize) }

    /// The final register set: the slots listed in `leading` (receiver and parameters, in
    /// declaration order), then every other slot register by slot index, then synthesized
    /// registers in creation order.
    pub fn into_ordered(self, leading : &[u16]) -> Vec<Local> {
        let Locals { by_slot, mut all, .. } = self;

        let mut order : Vec<LocalId> = leading.iter().filter_map(|s| by_slot.get(s).copied()).collect();
        order.extend(by_slot.iter().filter(|(s, _)| !leading.contains(*s)).map(|(_, &id)| id));
        let slotted : Vec<LocalId> = by_slot.values().copied().collect();
        order.extend(all.iter().map(|l| l.id).filter(|id| !slotted.contains(id)));

        let mut taken : Vec<Option<Local>> = all.drain(..).map(Some).collect();
        order.into_iter().filter_map(|id| taken[id.0 as usize].take()).collect()
    }
}

#[test]
fn test_slot_registers() -> crate::GeneralResult<()> {
    let names = vec![
        LocalName { index : 1, name : "count".to_owned() },
        LocalName { index : 1, name : "shadowed".to_owned() },
    ];
    let mut locals = Locals::new(3, &names);
    let a = locals.slot(0)?;
    let b = locals.slot(1)?;
    assert_eq!(a, locals.slot(0)?);
    assert_ne!(a, b);
    assert_eq!(Some("l0"), locals.get(a).map(|l| l.name.as_str()));
    assert_eq!(Some("count"), locals.get(b).map(|l| l.name.as_str()));
    assert_eq!(Err(ErrorKind::InvalidLocal { index : 3, max : 3 }), locals.slot(3));
    Ok(())
}

#[test]
fn test_fresh_registers() -> crate::GeneralResult<()> {
    let mut locals = Locals::new(2, &[]);
    let s = locals.fresh();
    let t = locals.fresh();
    assert_ne!(s, t);
    assert_eq!(Some("$stack2"), locals.get(s).map(|l| l.name.as_str()));
    assert_eq!(Some("$stack3"), locals.get(t).map(|l| l.name.as_str()));
    Ok(())
}

#[test]
fn test_ordering() -> crate::GeneralResult<()> {
    let mut locals = Locals::new(4, &[]);
    let _ = locals.fresh();
    let _ = locals.slot(3)?;
    let _ = locals.declare(1, Type::Long)?;
    let _ = locals.declare(0, Type::Int)?;
    let _ = locals.fresh();
    let names : Vec<String> = locals.into_ordered(&[ 0, 1 ]).into_iter().map(|l| l.name).collect();
    assert_eq!(vec![ "l0", "l1", "l3", "$stack4", "$stack5" ], names);
    Ok(())
}
