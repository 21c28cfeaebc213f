//! Participant summaries
//!
//! Scores selected stimulus rows (correctness and timing) and rolls them up
//! into one [`ParticipantSummary`] per participant.

use crate::config::CorrectnessSource;
use crate::schema::{RawTrialRow, TrialTable};
use crate::types::{ParticipantSummary, StimulusTrial};

/// Column holding a precomputed correctness flag
pub const CORRECT_FIELD: &str = "correct";
/// Column holding the participant's answer
pub const RESPONSE_FIELD: &str = "response";
/// Column holding the expected answer
pub const CORRECT_RESPONSE_FIELD: &str = "correct_response";

/// How correctness is read for one particular table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correctness {
    Field,
    ResponseMatch,
}

/// Turns selected rows into scored [`StimulusTrial`]s
#[derive(Debug, Clone)]
pub struct TrialScorer {
    correctness: CorrectnessSource,
    timing_priority: Vec<String>,
}

impl TrialScorer {
    pub fn new(correctness: CorrectnessSource, timing_priority: &[String]) -> Self {
        Self {
            correctness,
            timing_priority: timing_priority.to_vec(),
        }
    }

    /// The timing column used for `table`: the first priority entry the table has
    pub fn timing_field<'a>(&'a self, table: &TrialTable) -> Option<&'a str> {
        self.timing_priority
            .iter()
            .find(|f| table.has_column(f))
            .map(String::as_str)
    }

    fn correctness_for(&self, table: &TrialTable) -> Correctness {
        match self.correctness {
            CorrectnessSource::Auto if table.has_column(CORRECT_FIELD) => Correctness::Field,
            CorrectnessSource::Auto => Correctness::ResponseMatch,
            CorrectnessSource::CorrectField => Correctness::Field,
            CorrectnessSource::ResponseMatch => Correctness::ResponseMatch,
        }
    }

    /// Score the selected rows of `table` for one participant
    pub fn score(
        &self,
        table: &TrialTable,
        rows: &[&RawTrialRow],
        participant_id: &str,
    ) -> Vec<StimulusTrial> {
        let correctness = self.correctness_for(table);
        let timing = self.timing_field(table);

        rows.iter()
            .map(|row| {
                let is_correct = match correctness {
                    Correctness::Field => row.get(CORRECT_FIELD).as_indicator(),
                    Correctness::ResponseMatch => row
                        .get(RESPONSE_FIELD)
                        .strict_eq(row.get(CORRECT_RESPONSE_FIELD)),
                };
                let response_time = timing.and_then(|f| row.get(f).as_f64());

                StimulusTrial {
                    participant_id: participant_id.to_string(),
                    row: (*row).clone(),
                    is_correct,
                    response_time,
                }
            })
            .collect()
    }
}

/// Running totals for one participant, fed one component result at a time
#[derive(Debug, Clone, Default)]
pub struct ParticipantAccumulator {
    participant_id: String,
    total_correct: u32,
    total_responses: u32,
    rt_sum: f64,
    rt_count: u32,
}

impl ParticipantAccumulator {
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, trial: &StimulusTrial) {
        self.total_responses += 1;
        if trial.is_correct {
            self.total_correct += 1;
        }
        if let Some(rt) = trial.response_time {
            self.rt_sum += rt;
            self.rt_count += 1;
        }
    }

    pub fn extend<'a>(&mut self, trials: impl IntoIterator<Item = &'a StimulusTrial>) {
        for trial in trials {
            self.add(trial);
        }
    }

    pub fn total_responses(&self) -> u32 {
        self.total_responses
    }

    /// Produce the summary, stripping `prefix` from the id to form the join key
    pub fn finish(&self, prefix: &str) -> ParticipantSummary {
        let accuracy = if self.total_responses > 0 {
            Some(f64::from(self.total_correct) / f64::from(self.total_responses))
        } else {
            None
        };
        let avg_rt = if self.rt_count > 0 {
            Some(self.rt_sum / f64::from(self.rt_count))
        } else {
            None
        };

        ParticipantSummary {
            participant_id: self.participant_id.clone(),
            participant_id_clean: clean_participant_id(&self.participant_id, prefix),
            total_correct: self.total_correct,
            total_responses: self.total_responses,
            accuracy,
            avg_rt,
        }
    }
}

/// Summarize a set of stimulus trials belonging to one participant
pub fn summarize(
    participant_id: &str,
    trials: &[StimulusTrial],
    prefix: &str,
) -> ParticipantSummary {
    let mut acc = ParticipantAccumulator::new(participant_id);
    acc.extend(trials);
    acc.finish(prefix)
}

/// Strip the result-folder prefix from a participant id, if present
pub fn clean_participant_id(raw: &str, prefix: &str) -> String {
    raw.strip_prefix(prefix).unwrap_or(raw).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use pretty_assertions::assert_eq;

    const PREFIX: &str = "study_result_";

    fn table(csv: &str) -> TrialTable {
        TrialTable::from_reader(csv.as_bytes()).unwrap().unwrap()
    }

    fn scorer(correctness: CorrectnessSource) -> TrialScorer {
        TrialScorer::new(correctness, &PipelineConfig::default().timing_field_priority)
    }

    fn score_all(t: &TrialTable, correctness: CorrectnessSource) -> Vec<StimulusTrial> {
        let rows: Vec<&RawTrialRow> = t.rows.iter().collect();
        scorer(correctness).score(t, &rows, "study_result_7")
    }

    #[test]
    fn test_summary_from_correct_field() {
        let t = table("sound1,correct,average_response_time\nstim_a,1,500\nstim_b,0,700\n");
        let trials = score_all(&t, CorrectnessSource::Auto);
        let summary = summarize("study_result_7", &trials, PREFIX);

        assert_eq!(
            summary,
            ParticipantSummary {
                participant_id: "study_result_7".to_string(),
                participant_id_clean: "7".to_string(),
                total_correct: 1,
                total_responses: 2,
                accuracy: Some(0.5),
                avg_rt: Some(600.0),
            }
        );
    }

    #[test]
    fn test_correct_field_accepts_booleans() {
        let t = table("sound1,correct\nstim_a,true\nstim_b,false\nstim_c,true\n");
        let summary = summarize("p", &score_all(&t, CorrectnessSource::CorrectField), PREFIX);
        assert_eq!(summary.total_correct, 2);
    }

    #[test]
    fn test_response_match_is_strict() {
        let t = table(
            "response,correct_response\n\
             f,f\n\
             F,f\n\
             j,\n\
             1,1\n",
        );
        let trials = score_all(&t, CorrectnessSource::Auto);
        let flags: Vec<bool> = trials.iter().map(|t| t.is_correct).collect();

        assert_eq!(flags, vec![true, false, false, true]);
    }

    #[test]
    fn test_response_match_respects_column_types() {
        let t = table("response,correct_response\n1,1\nf,f\n");
        let trials = score_all(&t, CorrectnessSource::Auto);
        let flags: Vec<bool> = trials.iter().map(|t| t.is_correct).collect();
        assert_eq!(flags, vec![true, true]);

        let t = table("response,correct_response\n1,1\nf,2\n");
        let trials = score_all(&t, CorrectnessSource::Auto);
        assert!(!trials[0].is_correct);
    }

    #[test]
    fn test_forced_response_match_ignores_correct_column() {
        let t = table("correct,response,correct_response\n1,f,j\n");
        let trials = score_all(&t, CorrectnessSource::ResponseMatch);
        assert!(!trials[0].is_correct);
    }

    #[test]
    fn test_non_numeric_timing_excluded_not_zeroed() {
        let t = table("correct,response_time\n1,400\n1,timeout\n0,\n1,800\n");
        let summary = summarize("p", &score_all(&t, CorrectnessSource::Auto), PREFIX);

        assert_eq!(summary.total_responses, 4);
        assert_eq!(summary.avg_rt, Some(600.0));
    }

    #[test]
    fn test_timing_priority_prefers_average() {
        let t = table("correct,response_time,average_response_time\n1,100,500\n");
        let s = scorer(CorrectnessSource::Auto);
        assert_eq!(s.timing_field(&t), Some("average_response_time"));

        let trials = score_all(&t, CorrectnessSource::Auto);
        assert_eq!(trials[0].response_time, Some(500.0));
    }

    #[test]
    fn test_no_timing_field() {
        let t = table("correct\n1\n");
        let summary = summarize("p", &score_all(&t, CorrectnessSource::Auto), PREFIX);
        assert_eq!(summary.avg_rt, None);
    }

    #[test]
    fn test_zero_responses_accuracy_undefined() {
        let summary = summarize("study_result_3", &[], PREFIX);
        assert_eq!(summary.total_responses, 0);
        assert_eq!(summary.accuracy, None);
        assert_eq!(summary.avg_rt, None);
    }

    #[test]
    fn test_accuracy_bounds() {
        let t = table("correct\n1\n1\n0\n1\n0\n");
        let summary = summarize("p", &score_all(&t, CorrectnessSource::Auto), PREFIX);
        let accuracy = summary.accuracy.unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
        assert!((accuracy - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_accumulator_pools_component_results() {
        let first = table("correct,average_response_time\n1,500\n0,700\n");
        let second = table("correct,response_time\n1,300\n");

        let mut acc = ParticipantAccumulator::new("study_result_9");
        acc.extend(&score_all(&first, CorrectnessSource::Auto));
        acc.extend(&score_all(&second, CorrectnessSource::Auto));
        let summary = acc.finish(PREFIX);

        assert_eq!(summary.total_correct, 2);
        assert_eq!(summary.total_responses, 3);
        assert_eq!(summary.avg_rt, Some(500.0));
    }

    #[test]
    fn test_clean_participant_id() {
        assert_eq!(clean_participant_id("study_result_482910", PREFIX), "482910");
        assert_eq!(clean_participant_id("482910", PREFIX), "482910");
        assert_eq!(clean_participant_id("pilot_study_result_1", PREFIX), "pilot_study_result_1");
    }
}
