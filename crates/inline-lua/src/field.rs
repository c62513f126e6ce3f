//! Lua view of a live text field.

use inline_event::TextField;
use mlua::{UserData, UserDataFields, UserDataMethods};
use std::sync::Arc;

/// Field handle passed as the first argument to commands and watchers.
#[derive(Clone)]
pub struct FieldHandle(Arc<dyn TextField>);

impl FieldHandle {
    #[must_use]
    pub fn new(field: Arc<dyn TextField>) -> Self {
        Self(field)
    }

    #[must_use]
    pub fn field(&self) -> &Arc<dyn TextField> {
        &self.0
    }
}

impl UserData for FieldHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("id", |_, this| Ok(this.0.id().0));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("getText", |_, this, ()| Ok(this.0.text()));
        methods.add_method("setText", |_, this, text: String| {
            this.0.set_text(&text);
            Ok(())
        });
        methods.add_method("getSelectionStart", |_, this, ()| {
            Ok(this.0.selection_start())
        });
        methods.add_method("getSelectionEnd", |_, this, ()| Ok(this.0.selection_end()));
        // field:setSelection(start, end?) collapses the selection when end is omitted.
        methods.add_method(
            "setSelection",
            |_, this, (start, end): (i64, Option<i64>)| {
                let start = usize::try_from(start.max(0)).unwrap_or(0);
                let end = end.map_or(start, |e| usize::try_from(e.max(0)).unwrap_or(0));
                this.0.set_selection(start, end);
                Ok(())
            },
        );
        methods.add_meta_method(mlua::MetaMethod::ToString, |_, this, ()| {
            Ok(this.0.id().to_string())
        });
    }
}
