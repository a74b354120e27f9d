// Routine Parameter Binding
//
// Maps a stored routine's declared parameters to value slots for one call.
// Slots keep declaration order so positional arguments bind left to right.

use linked_hash_map::LinkedHashMap;
use log::trace;

use crate::catalog::{DataType, ParamDef, ParamDirection, RoutineDef};
use crate::query::executor::result::{convert_data_value, DataValue, QueryError, QueryResult};

/// One bound parameter: declaration plus current value
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    pub name: String,
    /// Unknown until the first non-NULL store when not declared
    pub data_type: Option<DataType>,
    pub direction: ParamDirection,
    pub value: DataValue,
}

impl ParamSlot {
    pub fn from_def(def: &ParamDef) -> Self {
        ParamSlot {
            name: def.name.clone(),
            data_type: def.data_type,
            direction: def.direction,
            value: DataValue::Null,
        }
    }

    /// Return slot whose type is fixed by the first value stored
    pub fn inferred_return(name: &str, initial: DataValue) -> Self {
        ParamSlot {
            name: name.to_string(),
            data_type: initial.data_type(),
            direction: ParamDirection::Return,
            value: initial,
        }
    }

    /// Store a value, converting to the declared type or inferring it
    pub fn store(&mut self, value: DataValue) -> QueryResult<()> {
        match self.data_type {
            Some(target) => self.value = convert_data_value(&value, target)?,
            None => {
                self.data_type = value.data_type();
                self.value = value;
            }
        }
        Ok(())
    }
}

/// Parameters of one routine invocation
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    slots: LinkedHashMap<String, ParamSlot>,
    return_slot: Option<ParamSlot>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots for every declared parameter, all NULL. A function also gets a
    /// return slot typed by its RETURNS clause.
    pub fn for_routine(def: &RoutineDef) -> Self {
        let slots = def
            .params
            .iter()
            .map(|p| (p.name.to_lowercase(), ParamSlot::from_def(p)))
            .collect();
        let return_slot = def.returns.map(|data_type| ParamSlot {
            name: def.name.clone(),
            data_type: Some(data_type),
            direction: ParamDirection::Return,
            value: DataValue::Null,
        });
        ParameterMap { slots, return_slot }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Parameter by name; absent when the routine declares no such parameter
    pub fn get(&self, name: &str) -> Option<&ParamSlot> {
        self.slots.get(&name.to_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ParamSlot> {
        self.slots.get_mut(&name.to_lowercase())
    }

    pub fn lookup(&self, name: &str) -> Option<DataValue> {
        self.get(name).map(|slot| slot.value.clone())
    }

    /// Bind the argument at `position` to the parameter declared there
    pub fn bind_position(&mut self, position: usize, value: DataValue) -> QueryResult<&ParamSlot> {
        let count = self.slots.len();
        let slot = self
            .slots
            .iter_mut()
            .nth(position)
            .map(|(_, slot)| slot)
            .ok_or_else(|| QueryError::ExecutionError(format!(
                "Too many arguments: routine declares {} parameter(s)",
                count
            )))?;
        trace!("bind #{} -> {}", position, slot.name);
        slot.store(value)?;
        Ok(slot)
    }

    pub fn bind_named(&mut self, name: &str, value: DataValue) -> QueryResult<&ParamSlot> {
        let slot = self
            .slots
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| QueryError::ExecutionError(format!("Routine has no parameter named '{}'", name)))?;
        slot.store(value)?;
        Ok(slot)
    }

    /// Bind arguments positionally; missing trailing parameters stay NULL
    pub fn bind_all(&mut self, args: Vec<DataValue>) -> QueryResult<()> {
        for (position, value) in args.into_iter().enumerate() {
            self.bind_position(position, value)?;
        }
        Ok(())
    }

    pub fn set_return_slot(&mut self, slot: ParamSlot) {
        self.return_slot = Some(slot);
    }

    pub fn has_return_slot(&self) -> bool {
        self.return_slot.is_some()
    }

    pub fn return_slot_mut(&mut self) -> Option<&mut ParamSlot> {
        self.return_slot.as_mut()
    }

    /// Value of the return slot, NULL when none was declared or stored
    pub fn return_value(&self) -> DataValue {
        self.return_slot
            .as_ref()
            .map(|slot| slot.value.clone())
            .unwrap_or(DataValue::Null)
    }

    pub fn slots(&self) -> impl Iterator<Item = &ParamSlot> {
        self.slots.iter().map(|(_, slot)| slot)
    }
}
