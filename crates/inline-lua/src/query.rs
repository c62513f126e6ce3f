//! Per-match query handed to command callables.
//!
//! A query carries the field, the text the command should operate on, the
//! matched expression and its argument string. `answer` rewrites the text and
//! places the caret.
//!
//! ```lua
//! module:registerCommand("upper", function(field, query)
//!     query:answer(query.args:upper())      -- caret after the reply
//!     -- query:answer("done", true)         -- caret at end of text
//! end)
//! ```
//!
//! Positions exposed to scripts (`startPosition`, caret) are char indices.

use inline_event::TextField;
use mlua::{UserData, UserDataFields, UserDataMethods};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

struct QueryState {
    field: Arc<dyn TextField>,
    /// Text at the moment the query was built.
    original: String,
    /// Current text, updated by every `answer`.
    text: String,
    expression: String,
    args: String,
}

/// Shared handle to one query. Clones refer to the same state.
#[derive(Clone)]
pub struct QueryHandle(Arc<Mutex<QueryState>>);

impl QueryHandle {
    #[must_use]
    pub fn new(
        field: Arc<dyn TextField>,
        text: String,
        expression: String,
        args: String,
    ) -> Self {
        Self(Arc::new(Mutex::new(QueryState {
            field,
            original: text.clone(),
            text,
            expression,
            args,
        })))
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.0.lock().text.clone()
    }

    #[must_use]
    pub fn original_text(&self) -> String {
        self.0.lock().original.clone()
    }

    #[must_use]
    pub fn expression(&self) -> String {
        self.0.lock().expression.clone()
    }

    #[must_use]
    pub fn args(&self) -> String {
        self.0.lock().args.clone()
    }

    /// Char index of the first occurrence of the expression in the current
    /// text, or `-1` if it is no longer present.
    #[must_use]
    pub fn start_position(&self) -> i64 {
        let state = self.0.lock();
        state
            .text
            .find(&state.expression)
            .map_or(-1, |byte| char_count(&state.text[..byte]) as i64)
    }

    /// Returns the current text with every occurrence of the expression
    /// replaced by `replacement`. Does not modify anything.
    #[must_use]
    pub fn replace_expression(&self, replacement: &str) -> String {
        let state = self.0.lock();
        replace_all(&state.text, &state.expression, replacement)
    }

    /// Replaces every occurrence of the expression with `reply` (empty when
    /// `None`), writes the result to the field and moves the caret.
    ///
    /// The caret lands right after the reply, computed from the field's
    /// selection start before the write, or at the end of the text when
    /// `cursor_to_end` is set. It is clamped into the new text.
    pub fn answer(&self, reply: Option<&str>, cursor_to_end: bool) {
        let reply = reply.unwrap_or_default();

        let (field, new_text, caret) = {
            let mut state = self.0.lock();
            let new_text = replace_all(&state.text, &state.expression, reply);
            let len = char_count(&new_text) as i64;

            let caret = if cursor_to_end {
                len
            } else {
                state.field.selection_start() as i64 - char_count(&state.expression) as i64
                    + char_count(reply) as i64
            };

            state.text.clone_from(&new_text);
            (Arc::clone(&state.field), new_text, caret.clamp(0, len) as usize)
        };

        field.set_text(&new_text);
        field.set_selection(caret, caret);
    }
}

impl fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.lock();
        f.debug_struct("QueryHandle")
            .field("field", &state.field.id())
            .field("expression", &state.expression)
            .field("args", &state.args)
            .field("text", &state.text)
            .finish()
    }
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

fn replace_all(text: &str, expression: &str, replacement: &str) -> String {
    if expression.is_empty() {
        return text.to_string();
    }
    text.replace(expression, replacement)
}

impl UserData for QueryHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("args", |_, this| Ok(this.args()));
        fields.add_field_method_get("expression", |_, this| Ok(this.expression()));
        fields.add_field_method_get("text", |_, this| Ok(this.text()));
        fields.add_field_method_get("currentText", |_, this| Ok(this.original_text()));
        fields.add_field_method_get("startPosition", |_, this| Ok(this.start_position()));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // query:answer(reply?, cursorToEnd?)
        methods.add_method(
            "answer",
            |_, this, (reply, to_end): (Option<String>, Option<bool>)| {
                this.answer(reply.as_deref(), to_end.unwrap_or(false));
                Ok(())
            },
        );

        methods.add_method("replaceExpression", |_, this, replacement: String| {
            Ok(this.replace_expression(&replacement))
        });

        methods.add_method("getArgs", |_, this, ()| Ok(this.args()));
        methods.add_method("getExpression", |_, this, ()| Ok(this.expression()));
        methods.add_method("getText", |_, this, ()| Ok(this.text()));
        methods.add_method("getStartPosition", |_, this, ()| Ok(this.start_position()));

        methods.add_meta_method(mlua::MetaMethod::ToString, |_, this, ()| {
            Ok(format!("{this:?}"))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inline_event::MemoryField;

    fn query_on(text: &str, expression: &str, args: &str) -> (QueryHandle, Arc<MemoryField>) {
        let field = Arc::new(MemoryField::new(text));
        let query = QueryHandle::new(
            field.clone() as Arc<dyn TextField>,
            text.to_string(),
            expression.to_string(),
            args.to_string(),
        );
        (query, field)
    }

    #[test]
    fn answer_places_caret_after_reply() {
        let (query, field) = query_on("say {cmd}$ now", "{cmd}$", "");
        // Caret right after the match, as when the user just typed "$".
        field.set_selection(10, 10);

        query.answer(Some("R"), false);

        assert_eq!(field.text(), "say R now");
        assert_eq!(field.selection(), (5, 5));
        assert_eq!(query.text(), "say R now");
    }

    #[test]
    fn answer_cursor_to_end() {
        let (query, field) = query_on("{cmd}$ tail", "{cmd}$", "");
        field.set_selection(6, 6);

        query.answer(Some("Reply"), true);

        assert_eq!(field.text(), "Reply tail");
        assert_eq!(field.selection(), (10, 10));
    }

    #[test]
    fn answer_without_reply_deletes_expression() {
        let (query, field) = query_on("a{x}$b", "{x}$", "");
        field.set_selection(5, 5);
        query.answer(None, false);
        assert_eq!(field.text(), "ab");
        assert_eq!(field.selection(), (1, 1));
    }

    #[test]
    fn answer_replaces_every_occurrence() {
        let (query, field) = query_on("{d}$ and {d}$", "{d}$", "");
        query.answer(Some("X"), false);
        assert_eq!(field.text(), "X and X");
    }

    #[test]
    fn caret_is_clamped() {
        let (query, field) = query_on("{long command}$", "{long command}$", "command");
        field.set_selection(0, 0);
        query.answer(Some("x"), false);
        assert_eq!(field.selection(), (0, 0));
    }

    #[test]
    fn positions_count_chars() {
        let (query, field) = query_on("héé {u}$", "{u}$", "");
        assert_eq!(query.start_position(), 4);
        field.set_selection(8, 8);
        query.answer(Some("ü"), false);
        assert_eq!(field.text(), "héé ü");
        assert_eq!(field.selection(), (5, 5));
    }

    #[test]
    fn start_position_tracks_current_text() {
        let (query, _) = query_on("abc {x}$", "{x}$", "");
        assert_eq!(query.start_position(), 4);
        query.answer(Some("y"), false);
        assert_eq!(query.start_position(), -1);
        assert_eq!(query.original_text(), "abc {x}$");
    }

    #[test]
    fn replace_expression_is_pure() {
        let (query, field) = query_on("1 {e}$ 2", "{e}$", "");
        assert_eq!(query.replace_expression("E"), "1 E 2");
        assert_eq!(field.text(), "1 {e}$ 2");
        assert_eq!(query.text(), "1 {e}$ 2");
    }

    #[test]
    fn lua_api() {
        let lua = mlua::Lua::new();
        let (query, field) = query_on("x {up hi}$", "{up hi}$", "hi");
        lua.globals().set("query", query.clone()).unwrap();

        let (args, expr, start): (String, String, i64) = lua
            .load("return query.args, query:getExpression(), query.startPosition")
            .eval()
            .unwrap();
        assert_eq!(args, "hi");
        assert_eq!(expr, "{up hi}$");
        assert_eq!(start, 2);

        lua.load("query:answer(query.args:upper(), true)").exec().unwrap();
        assert_eq!(field.text(), "x HI");
        assert_eq!(field.selection(), (4, 4));
    }
}
