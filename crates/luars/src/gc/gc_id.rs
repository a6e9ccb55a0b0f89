use crate::{BinaryId, FunctionId, StringId, TableId, ThreadId, UpvalueId, UserdataId};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcObjectKind {
    String = 0,
    Table = 1,
    Function = 2,
    Upvalue = 3,
    Thread = 4,
    Userdata = 5,
    Binary = 6,
}

/// Unified GC object identifier, tagged by object kind.
/// Mirrors the typed IDs handed out by the object pool so the collector
/// can walk mixed worklists (gray set, barriers) without losing type info.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GcId {
    StringId(StringId),
    TableId(TableId),
    FunctionId(FunctionId),
    UpvalueId(UpvalueId),
    ThreadId(ThreadId),
    UserdataId(UserdataId),
    BinaryId(BinaryId),
}

impl GcId {
    #[inline(always)]
    pub fn gc_type(self) -> GcObjectKind {
        match self {
            GcId::StringId(_) => GcObjectKind::String,
            GcId::TableId(_) => GcObjectKind::Table,
            GcId::FunctionId(_) => GcObjectKind::Function,
            GcId::UpvalueId(_) => GcObjectKind::Upvalue,
            GcId::ThreadId(_) => GcObjectKind::Thread,
            GcId::UserdataId(_) => GcObjectKind::Userdata,
            GcId::BinaryId(_) => GcObjectKind::Binary,
        }
    }

    #[inline(always)]
    pub fn index(self) -> u32 {
        match self {
            GcId::StringId(id) => id.index(),
            GcId::TableId(id) => id.index(),
            GcId::FunctionId(id) => id.index(),
            GcId::UpvalueId(id) => id.index(),
            GcId::ThreadId(id) => id.index(),
            GcId::UserdataId(id) => id.index(),
            GcId::BinaryId(id) => id.index(),
        }
    }

    pub fn main_id() -> Self {
        GcId::ThreadId(ThreadId(u32::MAX))
    }

    pub fn is_main(self) -> bool {
        matches!(self, GcId::ThreadId(ThreadId(idx)) if idx == u32::MAX)
    }
}
