use std::collections::HashMap;

use crate::storage::models::{Question, QuestionTopic};

const MAX_TOPICS: usize = 10;

/// 由题目集合聚合高频知识点。
///
/// 每道题优先使用 topics，没有 topics 时使用 keywords。只保留出现在两道及以上
/// 题目中的标签，按次数降序（同次数保持首次出现顺序），最多 10 个。
pub fn aggregate(questions: &[Question]) -> Vec<QuestionTopic> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut topics: Vec<QuestionTopic> = Vec::new();

    for question in questions {
        let labels = if question.topics.is_empty() {
            &question.keywords
        } else {
            &question.topics
        };

        for label in labels {
            match index.get(label.as_str()) {
                Some(&slot) => {
                    topics[slot].count += 1;
                    topics[slot].questions.push(question.id.clone());
                }
                None => {
                    index.insert(label.as_str(), topics.len());
                    topics.push(QuestionTopic {
                        name: label.clone(),
                        count: 1,
                        questions: vec![question.id.clone()],
                    });
                }
            }
        }
    }

    topics.retain(|t| t.count > 1);
    topics.sort_by(|a, b| b.count.cmp(&a.count));
    topics.truncate(MAX_TOPICS);
    topics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, topics: &[&str], keywords: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            text: format!("{} question text", id),
            year: "2022".to_string(),
            subject: "Operating Systems".to_string(),
            topics: topics.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            related_videos: Vec::new(),
        }
    }

    #[test]
    fn test_topics_take_precedence_over_keywords() {
        let questions = vec![
            question("q1", &["Paging"], &["memory"]),
            question("q2", &["Paging"], &["memory"]),
            question("q3", &[], &["memory", "frames"]),
            question("q4", &[], &["memory"]),
        ];

        let topics = aggregate(&questions);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "Paging");
        assert_eq!(topics[0].questions, vec!["q1", "q2"]);
        assert_eq!(topics[1].name, "memory");
        assert_eq!(topics[1].questions, vec!["q3", "q4"]);
    }

    #[test]
    fn test_sorted_stable_and_capped() {
        let mut questions = Vec::new();
        for i in 0..3 {
            let labels: Vec<String> = (0..12).map(|t| format!("t{}", t)).collect();
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            questions.push(question(&format!("a{}", i), &labels, &[]));
        }
        questions.push(question("b", &["t11", "t5"], &[]));

        let topics = aggregate(&questions);
        assert_eq!(topics.len(), 10);
        assert_eq!(topics[0].name, "t5");
        assert_eq!(topics[1].name, "t11");
        assert_eq!(topics[2].name, "t0");
        assert_eq!(topics[9].name, "t8");
    }

    #[test]
    fn test_output_invariants() {
        let questions = vec![
            question("q1", &["Deadlock", "Scheduling"], &[]),
            question("q2", &["Deadlock"], &[]),
            question("q3", &["Semaphore"], &[]),
            question("q4", &["Deadlock", "Scheduling", "Semaphore"], &[]),
            question("q5", &[], &["mutex"]),
        ];

        let topics = aggregate(&questions);
        assert!(!topics.is_empty());
        assert!(topics.len() <= MAX_TOPICS);
        for topic in &topics {
            assert!(topic.count >= 2);
            assert_eq!(topic.count, topic.questions.len());
        }
        assert!(topics.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }
}
