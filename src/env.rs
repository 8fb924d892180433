//! Reads GitHub Actions inputs and the environment variables they fall back to.

#![cfg(feature = "env")]

use std::{collections::HashMap, fmt::Display, str::FromStr};

use crate::error::{Error, Result};

/// A source of environment variables.
pub trait Env {
    /// Returns the value of `key`, or [`None`] if it is unset or not valid unicode.
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Env for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// The variable GitHub Actions stores an input in, e.g. `INPUT_ACCESS-TOKEN` for `access-token`.
pub fn input_key(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// Reads an action input. Blank inputs count as unset.
pub fn input<E>(env: &E, name: &str) -> Option<String>
where
    E: Env + ?Sized,
{
    env.var(&input_key(name))
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Reads an action input, falling back to the environment variable `fallback`.
///
/// # Errors
///
/// Returns [`Error::Validation`] if neither is defined.
pub fn input_or_env<E>(env: &E, name: &str, fallback: &str) -> Result<String>
where
    E: Env + ?Sized,
{
    input(env, name)
        .or_else(|| env.var(fallback).filter(|value| !value.is_empty()))
        .ok_or_else(|| {
            Error::validation(format!(
                "neither input {name} nor env var {fallback} are defined"
            ))
        })
}

/// Parses a value from [`String`] to something else, wrapping any error in [`Error::Validation`].
///
/// # Errors
///
/// Returns [`Error::Validation`] naming `name` if the value does not parse.
pub fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| Error::validation(format!("invalid {name} `{value}`: {err}")))
}
