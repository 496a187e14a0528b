//! Tool Table
//!
//! A view over the tool type, diameter and length parameter banks.

use serde::{Deserialize, Serialize};

use crate::parameters::{
    ParameterError, ParameterStore, TOOL_DIAMETER_BASE, TOOL_LENGTH_BASE, TOOL_TYPE_BASE,
};

/// Highest tool index
pub const TOOL_COUNT: usize = 99;

/// Tool type as stored in the type bank (-10..-19)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Undefined,
    FlatEndMill,
    BallEndMill,
    BullNoseMill,
    Drill,
    CenterDrill,
    Tap,
    Reamer,
    Boring,
    Chamfer,
    Probe,
}

impl ToolKind {
    pub fn from_code(code: f64) -> Self {
        match code.round() as i64 {
            -10 => ToolKind::FlatEndMill,
            -11 => ToolKind::BallEndMill,
            -12 => ToolKind::BullNoseMill,
            -13 => ToolKind::Drill,
            -14 => ToolKind::CenterDrill,
            -15 => ToolKind::Tap,
            -16 => ToolKind::Reamer,
            -17 => ToolKind::Boring,
            -18 => ToolKind::Chamfer,
            -19 => ToolKind::Probe,
            _ => ToolKind::Undefined,
        }
    }

    pub fn code(self) -> f64 {
        match self {
            ToolKind::Undefined => 0.0,
            ToolKind::FlatEndMill => -10.0,
            ToolKind::BallEndMill => -11.0,
            ToolKind::BullNoseMill => -12.0,
            ToolKind::Drill => -13.0,
            ToolKind::CenterDrill => -14.0,
            ToolKind::Tap => -15.0,
            ToolKind::Reamer => -16.0,
            ToolKind::Boring => -17.0,
            ToolKind::Chamfer => -18.0,
            ToolKind::Probe => -19.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tool {
    pub index: usize,
    pub kind: ToolKind,
    pub diameter: f64,
    pub length: f64,
}

/// Read-only tool lookups borrowing the parameter store.
pub struct ToolTable<'a> {
    store: &'a ParameterStore,
}

impl<'a> ToolTable<'a> {
    pub fn new(store: &'a ParameterStore) -> Self {
        Self { store }
    }

    pub fn get(&self, index: usize) -> Tool {
        if index == 0 || index > TOOL_COUNT {
            return Tool {
                index,
                kind: ToolKind::Undefined,
                diameter: 0.0,
                length: 0.0,
            };
        }
        Tool {
            index,
            kind: ToolKind::from_code(self.store.get(TOOL_TYPE_BASE + index)),
            diameter: self.store.get(TOOL_DIAMETER_BASE + index),
            length: self.store.get(TOOL_LENGTH_BASE + index),
        }
    }

    /// Half the tool diameter, zero for tool 0
    pub fn radius_of(&self, index: usize) -> f64 {
        self.get(index).diameter / 2.0
    }

    pub fn length_of(&self, index: usize) -> f64 {
        self.get(index).length
    }

    /// Consecutive tools with a defined type, starting at tool 1
    pub fn installed_count(&self) -> usize {
        (1..=TOOL_COUNT)
            .take_while(|i| self.store.get(TOOL_TYPE_BASE + i) != 0.0)
            .count()
    }
}

/// Queue the three parameter writes describing `tool`.
pub fn update_tool(store: &mut ParameterStore, tool: &Tool) -> Result<(), ParameterError> {
    store.queue_update(TOOL_TYPE_BASE + tool.index, tool.kind.code())?;
    store.queue_update(TOOL_DIAMETER_BASE + tool.index, tool.diameter)?;
    store.queue_update(TOOL_LENGTH_BASE + tool.index, tool.length)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_tool() -> ParameterStore {
        let mut store = ParameterStore::new();
        update_tool(
            &mut store,
            &Tool {
                index: 1,
                kind: ToolKind::FlatEndMill,
                diameter: 6.0,
                length: 40.0,
            },
        )
        .unwrap();
        store.commit();
        store
    }

    #[test]
    fn test_radius_and_length() {
        let store = store_with_tool();
        let tools = ToolTable::new(&store);
        assert_eq!(tools.radius_of(1), 3.0);
        assert_eq!(tools.length_of(1), 40.0);
        assert_eq!(tools.get(1).kind, ToolKind::FlatEndMill);
    }

    #[test]
    fn test_tool_zero_is_empty() {
        let store = store_with_tool();
        let tools = ToolTable::new(&store);
        assert_eq!(tools.radius_of(0), 0.0);
        assert_eq!(tools.length_of(0), 0.0);
    }

    #[test]
    fn test_installed_count() {
        let store = store_with_tool();
        assert_eq!(ToolTable::new(&store).installed_count(), 1);
    }
}
