//! Form reducer.
//!
//! Real-time field validation. Never calls a collaborator, so it works with
//! any environment.

use crate::actions::AuthAction;
use crate::state::{AuthState, FormField};
use crate::validation::validate_field;
use scholarlens_core::effect::Effect;
use scholarlens_core::reducer::Reducer;
use scholarlens_core::{SmallVec, smallvec};
use std::fmt;
use std::marker::PhantomData;

/// Form reducer.
pub struct FormReducer<E> {
    _env: PhantomData<fn() -> E>,
}

impl<E> FormReducer<E> {
    /// Create a new form reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self { _env: PhantomData }
    }
}

impl<E> Default for FormReducer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for FormReducer<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for FormReducer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FormReducer")
    }
}

impl<E> Reducer for FormReducer<E> {
    type State = AuthState;
    type Action = AuthAction;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AuthAction::UpdateFormField { field, value } => {
                let password = if field == FormField::Password {
                    value.clone()
                } else {
                    state.form.value(FormField::Password).to_string()
                };
                let validation = validate_field(field, &value, &password);
                state.form.set(field, value, validation);

                // Confirmation depends on the password
                if field == FormField::Password {
                    if let Some(confirm) = state.form.field(FormField::ConfirmPassword) {
                        let confirm = confirm.value.clone();
                        let validation = validate_field(FormField::ConfirmPassword, &confirm, &password);
                        state.form.set(FormField::ConfirmPassword, confirm, validation);
                    }
                }
                smallvec![Effect::None]
            },

            AuthAction::ResetForm => {
                state.form.clear();
                smallvec![Effect::None]
            },

            AuthAction::ClearError => {
                if state.clear_error() {
                    tracing::debug!("Error dismissed");
                }
                smallvec![Effect::None]
            },

            _ => smallvec![Effect::None],
        }
    }
}
