//! The settings schema and its version-aware linear codec.
//!
//! [`Schema`] owns one reactive cell per setting. [`Schema::walk`] visits
//! the cells in fixed declaration order against a tree node; the same walk
//! serves both directions (a [`TreeWriter`] at the current version for
//! saves, a [`TreeReader`] at the file's recorded version for loads), so
//! the migration rules live in exactly one place.
//!
//! # Wire Contract
//!
//! The persisted root is `{"preferences": {"version": N, <field>…}}`.
//! Field visit order is part of the contract: every released generation of
//! the on-disk format is decoded by this one walk, gated on the version it
//! recorded. Reordering fields here breaks historical files. The rules:
//!
//! - fields removed in some release are still read (into a throwaway
//!   local) under older versions so later fields stay aligned, and the
//!   locals are still written at the current version;
//! - fields that changed shape decode the legacy shape into a temporary
//!   and derive the current value from it;
//! - versions whose schema genuinely ended early terminate the walk;
//! - `advanced_ignore` is skipped when the version is *exactly* 6 — a
//!   targeted one-release repair, deliberately not generalized into a
//!   threshold rule.
//!
//! Encoding always writes [`CURRENT_VERSION`] and the full current field
//! set; migrations are read-path-only.

use std::collections::{BTreeMap, BTreeSet};

use gestured_reactive::Var;
use serde_json::{Map, Value};

use crate::error::PrefsError;
use crate::persist::{child, put_field, Persist};
use crate::types::{ButtonBinding, Rgb, TimeoutProfile};

/// Schema version written by this release.
pub const CURRENT_VERSION: u32 = 18;

/// Name of the wrapper object at the root of the persisted tree.
pub const SCHEMA_ROOT: &str = "preferences";

/// Sparse per-window-class override on top of the global button binding.
/// `None` means "gestures disabled for this class, no replacement binding".
pub type ExceptionTable = BTreeMap<String, Option<ButtonBinding>>;

/// One reactive cell per persisted setting, in declaration order.
pub struct Schema {
    pub exceptions: Var<ExceptionTable>,
    pub button: Var<ButtonBinding>,
    pub advanced_ignore: Var<bool>,
    pub proximity: Var<bool>,
    pub feedback: Var<bool>,
    pub left_handed: Var<bool>,
    pub init_timeout: Var<i32>,
    pub final_timeout: Var<i32>,
    pub timeout_profile: Var<TimeoutProfile>,
    pub timeout_gestures: Var<bool>,
    pub tray_icon: Var<bool>,
    pub excluded_devices: Var<BTreeSet<String>>,
    pub color: Var<Rgb>,
    pub trace_width: Var<i32>,
    pub extra_buttons: Var<Vec<ButtonBinding>>,
    pub advanced_popups: Var<bool>,
    pub scroll_invert: Var<bool>,
    pub scroll_speed: Var<f64>,
    pub tray_feedback: Var<bool>,
    pub show_osd: Var<bool>,
    pub move_back: Var<bool>,
    pub device_timeout: Var<BTreeMap<String, TimeoutProfile>>,
    pub whitelist: Var<bool>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            exceptions: Var::default(),
            button: Var::new(ButtonBinding::default()),
            advanced_ignore: Var::new(false),
            proximity: Var::new(false),
            feedback: Var::new(true),
            left_handed: Var::new(false),
            init_timeout: Var::new(250),
            final_timeout: Var::new(250),
            timeout_profile: Var::new(TimeoutProfile::Default),
            timeout_gestures: Var::new(false),
            tray_icon: Var::new(false),
            excluded_devices: Var::default(),
            color: Var::new(Rgb::default()),
            trace_width: Var::new(3),
            extra_buttons: Var::default(),
            advanced_popups: Var::new(true),
            scroll_invert: Var::new(true),
            scroll_speed: Var::new(2.0),
            tray_feedback: Var::new(false),
            show_osd: Var::new(true),
            move_back: Var::new(false),
            device_timeout: Var::default(),
            whitelist: Var::new(false),
        }
    }
}

/// One side of the linear codec: visits fields in walk order.
trait Archive {
    fn field<T: Persist>(&mut self, name: &str, value: &mut T) -> Result<(), PrefsError>;
}

/// Decoding side: looks fields up by name in a tree node.
struct TreeReader<'a> {
    fields: &'a Map<String, Value>,
}

impl Archive for TreeReader<'_> {
    fn field<T: Persist>(&mut self, name: &str, value: &mut T) -> Result<(), PrefsError> {
        let node = self
            .fields
            .get(name)
            .ok_or_else(|| PrefsError::decode(format!("missing field '{name}'")))?;
        value.load(node)
    }
}

/// Encoding side: appends fields in visit order.
struct TreeWriter {
    fields: Map<String, Value>,
}

impl Archive for TreeWriter {
    fn field<T: Persist>(&mut self, name: &str, value: &mut T) -> Result<(), PrefsError> {
        put_field(&mut self.fields, name, value);
        Ok(())
    }
}

impl Schema {
    /// Encode the full current field set at [`CURRENT_VERSION`].
    pub fn encode(&mut self) -> Value {
        let mut writer = TreeWriter { fields: Map::new() };
        writer.fields.insert("version".into(), CURRENT_VERSION.into());
        // infallible: TreeWriter::field never errors
        let _ = self.walk(&mut writer, CURRENT_VERSION);
        let mut root = Map::new();
        root.insert(SCHEMA_ROOT.into(), Value::Object(writer.fields));
        Value::Object(root)
    }

    /// Decode a persisted tree, applying the migration rules for the
    /// version it records. On error the schema may be partially written;
    /// callers decode into a scratch schema and adopt only on success.
    pub fn decode(&mut self, root: &Value) -> Result<(), PrefsError> {
        let body = child(root, SCHEMA_ROOT)?;
        let fields = body
            .as_object()
            .ok_or_else(|| PrefsError::decode("schema root is not an object"))?;
        let mut version = 0u32;
        version.load(child(body, "version")?)?;
        // version 0 is a real generation; only the future is unknown
        if version > CURRENT_VERSION {
            return Err(PrefsError::UnknownVersion(version));
        }
        let mut reader = TreeReader { fields };
        self.walk(&mut reader, version)
    }

    /// Copy every setting's value from `other` through the normal write
    /// path (so attached sinks observe the adoption).
    pub fn adopt(&self, other: &Schema) {
        self.exceptions.set(other.exceptions.get());
        self.button.set(other.button.get());
        self.advanced_ignore.set(other.advanced_ignore.get());
        self.proximity.set(other.proximity.get());
        self.feedback.set(other.feedback.get());
        self.left_handed.set(other.left_handed.get());
        self.init_timeout.set(other.init_timeout.get());
        self.final_timeout.set(other.final_timeout.get());
        self.timeout_profile.set(other.timeout_profile.get());
        self.timeout_gestures.set(other.timeout_gestures.get());
        self.tray_icon.set(other.tray_icon.get());
        self.excluded_devices.set(other.excluded_devices.get());
        self.color.set(other.color.get());
        self.trace_width.set(other.trace_width.get());
        self.extra_buttons.set(other.extra_buttons.get());
        self.advanced_popups.set(other.advanced_popups.get());
        self.scroll_invert.set(other.scroll_invert.get());
        self.scroll_speed.set(other.scroll_speed.get());
        self.tray_feedback.set(other.tray_feedback.get());
        self.show_osd.set(other.show_osd.get());
        self.move_back.set(other.move_back.get());
        self.device_timeout.set(other.device_timeout.get());
        self.whitelist.set(other.whitelist.get());
    }

    /// Attach `f` as a sink on every cell. Used to flip the store's dirty
    /// flag so the periodic save only runs when something changed.
    pub fn watch_all(&self, f: impl Fn() + Clone + 'static) {
        macro_rules! watch {
            ($field:ident) => {{
                let f = f.clone();
                self.$field.connect_fn(move |_| f());
            }};
        }
        watch!(exceptions);
        watch!(button);
        watch!(advanced_ignore);
        watch!(proximity);
        watch!(feedback);
        watch!(left_handed);
        watch!(init_timeout);
        watch!(final_timeout);
        watch!(timeout_profile);
        watch!(timeout_gestures);
        watch!(tray_icon);
        watch!(excluded_devices);
        watch!(color);
        watch!(trace_width);
        watch!(extra_buttons);
        watch!(advanced_popups);
        watch!(scroll_invert);
        watch!(scroll_speed);
        watch!(tray_feedback);
        watch!(show_osd);
        watch!(move_back);
        watch!(device_timeout);
        watch!(whitelist);
    }

    /// The linear field walk. Shared by encode (at `CURRENT_VERSION`,
    /// where no migration gate fires) and decode (at the file's version).
    fn walk<A: Archive>(&mut self, ar: &mut A, version: u32) -> Result<(), PrefsError> {
        if version < 11 {
            // exceptions used to be a bare set of window classes
            let mut classes: BTreeSet<String> = BTreeSet::new();
            ar.field("exceptions", &mut classes)?;
            let mut table = ExceptionTable::new();
            for class in classes {
                table.insert(class, None);
            }
            self.exceptions.set(table);
        } else {
            ar.field("exceptions", &mut self.exceptions)?;
        }
        if version < 14 {
            let mut p = 0.5f64;
            ar.field("p", &mut p)?;
        }
        ar.field("button", &mut self.button)?;
        if version < 2 {
            let mut help = false;
            ar.field("help", &mut help)?;
        }
        if version < 3 {
            let mut delay = 0i32;
            ar.field("delay", &mut delay)?;
        }
        if version == 1 {
            // the version-1 file ends with the same binding written twice
            let mut tail = ButtonBinding::default();
            ar.field("foo", &mut tail)?;
            ar.field("foo", &mut tail)?;
            return Ok(());
        }
        if version < 2 {
            return Ok(());
        }
        if version != 6 {
            // the version-6 release never wrote this field
            ar.field("advanced_ignore", &mut self.advanced_ignore)?;
        }
        let mut radius = 16i32;
        ar.field("radius", &mut radius)?;
        if version < 4 {
            return Ok(());
        }
        let mut ignore_grab = false;
        ar.field("ignore_grab", &mut ignore_grab)?;
        let mut timing_workaround = false;
        ar.field("timing_workaround", &mut timing_workaround)?;
        let mut show_clicks = false;
        ar.field("show_clicks", &mut show_clicks)?;
        let mut pressure_abort = false;
        ar.field("pressure_abort", &mut pressure_abort)?;
        let mut pressure_threshold = 192i32;
        ar.field("pressure_threshold", &mut pressure_threshold)?;
        ar.field("proximity", &mut self.proximity)?;
        if version < 5 {
            return Ok(());
        }
        ar.field("feedback", &mut self.feedback)?;
        ar.field("left_handed", &mut self.left_handed)?;
        ar.field("init_timeout", &mut self.init_timeout)?;
        ar.field("final_timeout", &mut self.final_timeout)?;
        if version < 8 {
            return Ok(());
        }
        ar.field("timeout_profile", &mut self.timeout_profile)?;
        if version < 9 {
            return Ok(());
        }
        ar.field("timeout_gestures", &mut self.timeout_gestures)?;
        ar.field("tray_icon", &mut self.tray_icon)?;
        if version < 10 {
            return Ok(());
        }
        ar.field("excluded_devices", &mut self.excluded_devices)?;
        if version < 12 {
            // color was a packed 0xRRGGBB integer before version 12
            let mut packed = 0u32;
            ar.field("color", &mut packed)?;
            self.color.set(Rgb::from_packed(packed));
            return Ok(());
        }
        ar.field("color", &mut self.color)?;
        ar.field("trace_width", &mut self.trace_width)?;
        if version < 13 {
            return Ok(());
        }
        ar.field("extra_buttons", &mut self.extra_buttons)?;
        ar.field("advanced_popups", &mut self.advanced_popups)?;
        ar.field("scroll_invert", &mut self.scroll_invert)?;
        ar.field("scroll_speed", &mut self.scroll_speed)?;
        ar.field("tray_feedback", &mut self.tray_feedback)?;
        ar.field("show_osd", &mut self.show_osd)?;
        if version < 16 {
            return Ok(());
        }
        ar.field("move_back", &mut self.move_back)?;
        if version < 17 {
            return Ok(());
        }
        ar.field("device_timeout", &mut self.device_timeout)?;
        if version < 18 {
            return Ok(());
        }
        ar.field("whitelist", &mut self.whitelist)?;
        Ok(())
    }
}
