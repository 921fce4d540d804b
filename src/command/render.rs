// src/command/render.rs

//! Per-rule command rendering. Pure functions of (rule, nominal time, files),
//! so repeated rendering with the same inputs is byte-identical.

use uuid::Uuid;

use super::args::{ArgList, float};
use super::{
    ACRR_ALGORITHM, COMPOSITE_ALGORITHM, GRA_ALGORITHM, GenerationCommand, SCANSUN_ALGORITHM,
    VOLUME_ALGORITHM,
};
use crate::nominal::NominalTime;
use crate::rule::term::TermPolicy;
use crate::rule::{AcrrRule, CompositeRule, GraRule, ScansunRule, VolumeRule};

pub fn composite(rule: &CompositeRule, nominal: NominalTime, files: Vec<Uuid>) -> GenerationCommand {
    let mut args = ArgList::new();
    args.push("area", &rule.area)
        .push("date", nominal.date_arg())
        .push("time", nominal.time_arg())
        .push("selection", rule.selection)
        .push_list("anomaly-qc", &rule.detectors)
        .push_if(!rule.detectors.is_empty(), "qc-mode", rule.qc_mode)
        .push("method", rule.method.to_string().to_lowercase())
        .push("prodpar", &rule.prodpar);
    if rule.apply_gra {
        args.push("applygra", true)
            .push("zrA", float(rule.zr.a))
            .push("zrb", float(rule.zr.b));
    }
    args.push_if(rule.ignore_malfunc, "ignore-malfunc", true)
        .push_if(rule.ctfilter, "ctfilter", "True")
        .push_non_empty("qitotal_field", &rule.qitotal_field)
        .push("quantity", &rule.quantity)
        .push("algorithm_id", &rule.id);

    GenerationCommand {
        algorithm: COMPOSITE_ALGORITHM.to_string(),
        files,
        arguments: args.finish(),
    }
}

pub fn volume(
    rule: &VolumeRule,
    source: &str,
    nominal: NominalTime,
    files: Vec<Uuid>,
) -> GenerationCommand {
    let arguments = ArgList::new()
        .push("source", source)
        .push("date", nominal.date_arg())
        .push("time", nominal.time_arg())
        .push_list("anomaly-qc", &rule.detectors)
        .push_if(!rule.detectors.is_empty(), "qc-mode", rule.qc_mode)
        .push("algorithm_id", &rule.id)
        .push("merge", true)
        .finish();

    GenerationCommand {
        algorithm: VOLUME_ALGORITHM.to_string(),
        files,
        arguments,
    }
}

fn term_args(args: &mut ArgList, term: &TermPolicy, nominal: NominalTime) {
    args.push("area", &term.area)
        .push("date", nominal.date_arg())
        .push("time", nominal.time_arg())
        .push("zra", float(term.zr.a))
        .push("zrb", float(term.zr.b))
        .push("quantity", &term.quantity)
        .push("accept", term.acceptable_loss)
        .push("N", term.expected_files())
        .push("hours", term.term.hours())
        .push("distancefield", &term.distance_field);
}

pub fn acrr(rule: &AcrrRule, nominal: NominalTime, files: Vec<Uuid>) -> GenerationCommand {
    let mut args = ArgList::new();
    term_args(&mut args, &rule.term, nominal);
    args.push_if(rule.apply_gra, "applygra", true)
        .push("algorithm_id", &rule.id);

    GenerationCommand {
        algorithm: ACRR_ALGORITHM.to_string(),
        files,
        arguments: args.finish(),
    }
}

pub fn gra(rule: &GraRule, nominal: NominalTime, files: Vec<Uuid>) -> GenerationCommand {
    let mut args = ArgList::new();
    term_args(&mut args, &rule.term, nominal);
    args.push("algorithm_id", &rule.id);

    GenerationCommand {
        algorithm: GRA_ALGORITHM.to_string(),
        files,
        arguments: args.finish(),
    }
}

pub fn scansun(rule: &ScansunRule, source: &str, file: Uuid) -> GenerationCommand {
    let arguments = ArgList::new()
        .push("source", source)
        .push("algorithm_id", &rule.id)
        .finish();

    GenerationCommand {
        algorithm: SCANSUN_ALGORITHM.to_string(),
        files: vec![file],
        arguments,
    }
}
