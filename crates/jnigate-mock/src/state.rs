//! Heap, reference table, classes and threads of one mock VM

use std::ffi::c_void;
use std::thread::ThreadId;

use jni_sys::{jfieldID, jmethodID, jobject, JNINativeInterface_};
use rustc_hash::FxHashMap;

use crate::class::{parameter_kinds, Behavior, ClassBuilder, ObjId};
use crate::{MockConfig, MockStats, Shared};

/// Bits of a handle that index the reference table; the rest is the VM serial
const HANDLE_BITS: u32 = 24;
const HANDLE_MASK: usize = (1 << HANDLE_BITS) - 1;

/// Member ids pack (class + 1) above this many bits and (member + 1) below
const MEMBER_BITS: u32 = 12;
const MEMBER_MASK: usize = (1 << MEMBER_BITS) - 1;

/// Bits written to the return slot of a call that threw
pub(crate) const INCIDENTAL: u64 = 0x5A5A_5A5A_5A5A_5A5A;

pub(crate) fn slot_to_obj(bits: u64) -> Option<ObjId> {
    (bits != 0).then(|| ObjId(bits as usize - 1))
}

pub(crate) fn obj_to_slot(obj: Option<ObjId>) -> u64 {
    obj.map_or(0, |obj| obj.0 as u64 + 1)
}

/// Per-thread environment, laid out so that a pointer to it is a `JNIEnv*`
#[repr(C)]
pub(crate) struct EnvSlot {
    pub(crate) table: *const JNINativeInterface_,
    pub(crate) shared: *const Shared,
    pub(crate) thread: ThreadId,
}

pub(crate) struct ThreadState {
    pub(crate) env: Box<EnvSlot>,
    pub(crate) attached: bool,
    pub(crate) runtime_owned: bool,
    pub(crate) pending: Option<ObjId>,
}

pub(crate) struct MethodDef {
    pub(crate) name: String,
    pub(crate) signature: String,
    pub(crate) is_static: bool,
    pub(crate) params: usize,
    pub(crate) behavior: Behavior,
}

pub(crate) struct FieldDef {
    pub(crate) name: String,
    pub(crate) signature: String,
}

pub(crate) struct ClassDef {
    pub(crate) name: String,
    pub(crate) superclass: Option<usize>,
    pub(crate) methods: Vec<MethodDef>,
    /// Instance field layout, inherited fields first
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) statics: Vec<FieldDef>,
    pub(crate) static_values: Vec<u64>,
    pub(crate) mirror: ObjId,
}

pub(crate) enum Payload {
    Plain,
    Str(String),
    Mirror(usize),
}

pub(crate) struct HeapObject {
    pub(crate) class: usize,
    pub(crate) fields: Vec<u64>,
    pub(crate) payload: Payload,
}

struct RefEntry {
    object: ObjId,
    global: bool,
    deleted: bool,
}

/// Result of a global reference delete
pub(crate) enum Delete {
    Deleted,
    Double,
    Foreign,
    NotGlobal,
}

pub(crate) struct State {
    pub(crate) config: MockConfig,
    pub(crate) stats: MockStats,
    pub(crate) fail_global_refs: usize,
    pub(crate) raise_on_string_chars: bool,
    serial: usize,
    env_table: *const JNINativeInterface_,
    shared: *const Shared,
    classes: Vec<ClassDef>,
    class_index: FxHashMap<String, usize>,
    heap: Vec<HeapObject>,
    refs: Vec<RefEntry>,
    threads: FxHashMap<ThreadId, ThreadState>,
}

impl State {
    pub(crate) fn new(
        config: MockConfig,
        serial: usize,
        env_table: *const JNINativeInterface_,
        shared: *const Shared,
    ) -> Self {
        Self {
            config,
            stats: MockStats::default(),
            fail_global_refs: 0,
            raise_on_string_chars: false,
            serial,
            env_table,
            shared,
            classes: Vec::new(),
            class_index: FxHashMap::default(),
            heap: Vec::new(),
            refs: Vec::new(),
            threads: FxHashMap::default(),
        }
    }

    // ========================================================================
    // Threads
    // ========================================================================

    /// Thread record, created detached on first sight. Records are never
    /// removed so stale env pointers stay readable.
    pub(crate) fn thread(&mut self, id: ThreadId) -> &mut ThreadState {
        let (table, shared) = (self.env_table, self.shared);
        self.threads.entry(id).or_insert_with(|| ThreadState {
            env: Box::new(EnvSlot {
                table,
                shared,
                thread: id,
            }),
            attached: false,
            runtime_owned: false,
            pending: None,
        })
    }

    pub(crate) fn is_attached(&self, id: ThreadId) -> bool {
        self.threads.get(&id).map_or(false, |t| t.attached)
    }

    pub(crate) fn env_ptr(&mut self, id: ThreadId) -> *mut c_void {
        let slot: &mut EnvSlot = &mut self.thread(id).env;
        slot as *mut EnvSlot as *mut c_void
    }

    pub(crate) fn pending(&self, id: ThreadId) -> Option<ObjId> {
        self.threads.get(&id).and_then(|t| t.pending)
    }

    pub(crate) fn set_pending(&mut self, id: ThreadId, exception: Option<ObjId>) {
        self.thread(id).pending = exception;
    }

    /// Bookkeeping every env function does on entry. Returns false when the
    /// call must not proceed because an exception is pending.
    pub(crate) fn enter(&mut self, id: ThreadId, exception_safe: bool) -> bool {
        if !self.is_attached(id) {
            self.stats.calls_after_detach += 1;
        }
        if !exception_safe && self.pending(id).is_some() {
            self.stats.calls_with_pending_exception += 1;
            return false;
        }
        true
    }

    // ========================================================================
    // Classes
    // ========================================================================

    pub(crate) fn define(&mut self, builder: ClassBuilder) -> usize {
        let idx = self.classes.len();
        let superclass = builder
            .superclass
            .as_deref()
            .and_then(|name| self.class_by_name(name));

        let mut fields: Vec<FieldDef> = superclass
            .map(|s| {
                self.classes[s]
                    .fields
                    .iter()
                    .map(|f| FieldDef {
                        name: f.name.clone(),
                        signature: f.signature.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        fields.extend(builder.fields.iter().map(|f| FieldDef {
            name: f.name.clone(),
            signature: f.signature.clone(),
        }));

        let methods = builder
            .methods
            .into_iter()
            .map(|m| MethodDef {
                params: parameter_kinds(&m.signature).len(),
                name: m.name,
                signature: m.signature,
                is_static: m.is_static,
                behavior: m.behavior,
            })
            .collect();

        let static_values = builder.statics.iter().map(|f| f.initial).collect();
        let statics = builder
            .statics
            .into_iter()
            .map(|f| FieldDef {
                name: f.name,
                signature: f.signature,
            })
            .collect();

        let mirror_class = self.class_by_name("java/lang/Class").unwrap_or(idx);
        let mirror = self.alloc(mirror_class, Vec::new(), Payload::Mirror(idx));

        self.classes.push(ClassDef {
            name: builder.name.clone(),
            superclass,
            methods,
            fields,
            statics,
            static_values,
            mirror,
        });
        self.class_index.insert(builder.name, idx);
        idx
    }

    pub(crate) fn class_by_name(&self, name: &str) -> Option<usize> {
        self.class_index.get(name).copied()
    }

    pub(crate) fn class(&self, idx: usize) -> &ClassDef {
        &self.classes[idx]
    }

    pub(crate) fn mirror(&self, class: usize) -> ObjId {
        self.classes[class].mirror
    }

    /// Class a mirror object stands for
    pub(crate) fn class_of_mirror(&self, obj: ObjId) -> Option<usize> {
        match self.heap.get(obj.0)?.payload {
            Payload::Mirror(class) => Some(class),
            _ => None,
        }
    }

    pub(crate) fn class_name_of(&self, obj: ObjId) -> &str {
        self.heap
            .get(obj.0)
            .map_or("", |o| self.classes[o.class].name.as_str())
    }

    /// Method lookup through the superclass chain
    pub(crate) fn find_method(
        &self,
        class: usize,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> Option<jmethodID> {
        let mut current = Some(class);
        while let Some(c) = current {
            let def = &self.classes[c];
            let found = def.methods.iter().position(|m| {
                m.name == name && m.signature == signature && m.is_static == is_static
            });
            if let Some(m) = found {
                return Some(encode_member(c, m) as jmethodID);
            }
            // Static methods and constructors are not inherited
            if is_static || name == "<init>" {
                return None;
            }
            current = def.superclass;
        }
        None
    }

    pub(crate) fn method(&self, id: jmethodID) -> Option<&MethodDef> {
        let (class, member) = decode_member(id as usize)?;
        self.classes.get(class)?.methods.get(member)
    }

    pub(crate) fn find_field(
        &self,
        class: usize,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> Option<jfieldID> {
        let def = &self.classes[class];
        let list = if is_static { &def.statics } else { &def.fields };
        list.iter()
            .position(|f| f.name == name && f.signature == signature)
            .map(|f| encode_member(class, f) as jfieldID)
    }

    // ========================================================================
    // Heap
    // ========================================================================

    fn alloc(&mut self, class: usize, fields: Vec<u64>, payload: Payload) -> ObjId {
        self.heap.push(HeapObject {
            class,
            fields,
            payload,
        });
        ObjId(self.heap.len() - 1)
    }

    pub(crate) fn alloc_instance(&mut self, class: usize) -> ObjId {
        let fields = vec![0; self.classes[class].fields.len()];
        self.alloc(class, fields, Payload::Plain)
    }

    pub(crate) fn new_string(&mut self, text: &str) -> ObjId {
        let class = self.class_by_name("java/lang/String").unwrap_or(0);
        self.alloc(class, Vec::new(), Payload::Str(text.to_string()))
    }

    pub(crate) fn string(&self, obj: ObjId) -> Option<&str> {
        match &self.heap.get(obj.0)?.payload {
            Payload::Str(text) => Some(text),
            _ => None,
        }
    }

    fn field_index(&self, obj: ObjId, name: &str) -> Option<usize> {
        let class = self.heap.get(obj.0)?.class;
        self.classes[class].fields.iter().position(|f| f.name == name)
    }

    pub(crate) fn named_field(&self, obj: ObjId, name: &str) -> Option<u64> {
        let idx = self.field_index(obj, name)?;
        self.heap[obj.0].fields.get(idx).copied()
    }

    pub(crate) fn set_named_field(&mut self, obj: ObjId, name: &str, bits: u64) {
        if let Some(idx) = self.field_index(obj, name) {
            self.heap[obj.0].fields[idx] = bits;
        }
    }

    pub(crate) fn field_slot(&mut self, obj: ObjId, id: jfieldID) -> Option<&mut u64> {
        let (_, member) = decode_member(id as usize)?;
        self.heap.get_mut(obj.0)?.fields.get_mut(member)
    }

    pub(crate) fn static_slot(&mut self, id: jfieldID) -> Option<&mut u64> {
        let (class, member) = decode_member(id as usize)?;
        self.classes.get_mut(class)?.static_values.get_mut(member)
    }

    /// Allocate an exception of `class` (falling back to RuntimeException)
    /// with `message` and make it pending on `thread`.
    pub(crate) fn raise(&mut self, thread: ThreadId, class: &str, message: &str) {
        let class = self
            .class_by_name(class)
            .or_else(|| self.class_by_name("java/lang/RuntimeException"))
            .unwrap_or(0);
        let exception = self.alloc_instance(class);
        let message = self.new_string(message);
        self.set_named_field(exception, "detailMessage", obj_to_slot(Some(message)));
        self.set_pending(thread, Some(exception));
    }

    // ========================================================================
    // References
    // ========================================================================

    fn new_ref(&mut self, object: ObjId, global: bool) -> jobject {
        self.refs.push(RefEntry {
            object,
            global,
            deleted: false,
        });
        ((self.serial << HANDLE_BITS) | self.refs.len()) as jobject
    }

    pub(crate) fn new_local(&mut self, object: Option<ObjId>) -> jobject {
        match object {
            Some(object) => self.new_ref(object, false),
            None => std::ptr::null_mut(),
        }
    }

    pub(crate) fn new_global(&mut self, object: ObjId) -> jobject {
        self.stats.global_refs_created += 1;
        self.new_ref(object, true)
    }

    fn entry(&self, handle: jobject) -> Option<&RefEntry> {
        let raw = handle as usize;
        if raw == 0 || raw >> HANDLE_BITS != self.serial {
            return None;
        }
        self.refs.get((raw & HANDLE_MASK).checked_sub(1)?)
    }

    /// Object a live handle of this VM refers to
    pub(crate) fn deref_handle(&self, handle: jobject) -> Option<ObjId> {
        self.entry(handle)
            .filter(|entry| !entry.deleted)
            .map(|entry| entry.object)
    }

    pub(crate) fn delete_global(&mut self, handle: jobject) -> Delete {
        let raw = handle as usize;
        if raw >> HANDLE_BITS != self.serial {
            return Delete::Foreign;
        }
        let Some(entry) = (raw & HANDLE_MASK)
            .checked_sub(1)
            .and_then(|idx| self.refs.get_mut(idx))
        else {
            return Delete::NotGlobal;
        };
        if !entry.global {
            Delete::NotGlobal
        } else if entry.deleted {
            Delete::Double
        } else {
            entry.deleted = true;
            Delete::Deleted
        }
    }

    pub(crate) fn live_globals(&self) -> usize {
        self.refs.iter().filter(|r| r.global && !r.deleted).count()
    }
}

fn encode_member(class: usize, member: usize) -> usize {
    ((class + 1) << MEMBER_BITS) | (member + 1)
}

fn decode_member(raw: usize) -> Option<(usize, usize)> {
    let class = (raw >> MEMBER_BITS).checked_sub(1)?;
    let member = (raw & MEMBER_MASK).checked_sub(1)?;
    Some((class, member))
}
