//! The only operations allowed to mutate a container's env list.
//!
//! Names are unique by convention only, the container runtime does not enforce it. Every write
//! goes through [`insert_if_absent`], which keeps the first declaration of a name authoritative
//! and makes repeated injection converge.

use k8s_openapi::api::core::v1::EnvVar;

/// Position of the first variable called `name`.
pub fn index_of(env: &[EnvVar], name: &str) -> Option<usize> {
    env.iter().position(|var| var.name == name)
}

/// Appends `var` unless a variable with the same name is already declared.
///
/// Returns `true` when the list was changed.
pub fn insert_if_absent(env: &mut Vec<EnvVar>, var: EnvVar) -> bool {
    if index_of(env, &var.name).is_some() {
        return false;
    }

    env.push(var);
    true
}

/// Moves the variable at `index` to the end of the list, keeping the relative order of the
/// others.
///
/// `None` or an out of range index leaves the list untouched.
pub fn move_to_end(env: &mut Vec<EnvVar>, index: Option<usize>) {
    if let Some(index) = index.filter(|index| *index < env.len()) {
        let var = env.remove(index);
        env.push(var);
    }
}
