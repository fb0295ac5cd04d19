// BSD 2-Clause License
//
// Copyright (c) 2024 Alasdair Armstrong
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
// notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
// notice, this list of conditions and the following disclaimer in the
// documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! This module loads a TOML file containing configuration for the
//! instrumentation layer: the memory model's endianness, which
//! failure kinds are reported, and how much expression detail the
//! collector is allowed to keep.

use toml::Value;

use crate::failure::FailureKind;
use crate::memory::Endianness;

#[derive(Clone, Debug)]
pub struct ListenerConfig {
    pub endianness: Endianness,
    /// Failure kinds forwarded to the collector. Kinds not listed are
    /// still classified, just not recorded.
    pub report: Vec<FailureKind>,
    /// Cap on the rendered detail of a complex expression summary.
    pub max_detail: usize,
}

impl ListenerConfig {
    pub fn reports(&self, kind: FailureKind) -> bool {
        self.report.contains(&kind)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            endianness: Endianness::Little,
            report: vec![
                FailureKind::Assertion,
                FailureKind::InvalidMemoryAccess,
                FailureKind::Arithmetic,
                FailureKind::Unclassified,
            ],
            max_detail: 4096,
        }
    }
}

fn get_endianness(config: &Value) -> Result<Endianness, String> {
    match config.get("endianness") {
        Some(Value::String(s)) if s == "little" => Ok(Endianness::Little),
        Some(Value::String(s)) if s == "big" => Ok(Endianness::Big),
        Some(_) => Err("Configuration option endianness must be \"little\" or \"big\"".to_string()),
        None => Ok(Endianness::Little),
    }
}

fn failure_kind(name: &str) -> Result<FailureKind, String> {
    match name {
        "assertion" => Ok(FailureKind::Assertion),
        "memory" => Ok(FailureKind::InvalidMemoryAccess),
        "arithmetic" => Ok(FailureKind::Arithmetic),
        "unclassified" => Ok(FailureKind::Unclassified),
        _ => Err(format!("Unknown failure kind {} in report option", name)),
    }
}

fn get_report(config: &Value) -> Result<Vec<FailureKind>, String> {
    match config.get("report") {
        Some(Value::Array(kinds)) => kinds
            .iter()
            .map(|v| {
                let kind = v.as_str().ok_or_else(|| "Each reported failure kind must be a string".to_string())?;
                failure_kind(kind)
            })
            .collect::<Result<_, _>>(),
        Some(_) => Err("Configuration option report must be an array of failure kinds".to_string()),
        None => Ok(ListenerConfig::default().report),
    }
}

fn get_max_detail(config: &Value) -> Result<usize, String> {
    match config.get("max-detail") {
        Some(Value::Integer(n)) if *n > 0 => Ok(*n as usize),
        Some(_) => Err("Configuration option max-detail must be a positive integer".to_string()),
        None => Ok(ListenerConfig::default().max_detail),
    }
}

pub fn parse_config(contents: &str) -> Result<ListenerConfig, String> {
    let config = contents.parse::<Value>().map_err(|e| format!("Error when parsing configuration: {}", e))?;
    Ok(ListenerConfig {
        endianness: get_endianness(&config)?,
        report: get_report(&config)?,
        max_detail: get_max_detail(&config)?,
    })
}
