use crate::Detection;

/// Classes worth flagging during a proctored session.
pub const RELEVANT_CLASSES: [&str; 13] = [
    "person",
    "cell phone",
    "laptop",
    "book",
    "remote",
    "tv",
    "keyboard",
    "mouse",
    "bottle",
    "cup",
    "chair",
    "backpack",
    "handbag",
];

pub fn is_relevant(class_name: &str) -> bool {
    RELEVANT_CLASSES.contains(&class_name)
}

/// Keep only allow-listed detections, preserving order.
pub fn filter_relevant(mut dets: Vec<Detection>) -> Vec<Detection> {
    dets.retain(|d| is_relevant(&d.class_name));
    dets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BBox;

    fn named(name: &str, conf: f32) -> Detection {
        Detection {
            class_id: vigil_model::class_id(name).unwrap_or(0),
            class_name: name.to_string(),
            confidence: conf,
            bbox: BBox::new(0.0, 0.0, 1.0, 1.0),
        }
    }

    #[test]
    fn allow_list_names_exist_in_label_table() {
        for name in RELEVANT_CLASSES {
            assert!(vigil_model::class_id(name).is_some(), "{name}");
        }
    }

    #[test]
    fn keeps_relevant_in_order() {
        let dets = vec![
            named("cell phone", 0.9),
            named("giraffe", 0.99),
            named("book", 0.6),
            named("pizza", 0.7),
            named("person", 0.8),
        ];
        let names: Vec<String> = filter_relevant(dets).into_iter().map(|d| d.class_name).collect();
        assert_eq!(names, vec!["cell phone", "book", "person"]);
    }

    #[test]
    fn matching_is_exact() {
        assert!(is_relevant("tv"));
        assert!(!is_relevant("TV"));
        assert!(!is_relevant("cell"));
    }
}
