//! Normalizing already normalized text changes nothing.

use folio::preprocess::Pipeline;
use folio::transform::FirstHeading;
use proptest::prelude::*;

/// Lines that exercise every rule, mixed with arbitrary prose.
fn markdown_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("---".to_string()),
        Just("-----".to_string()),
        Just("title: Draft".to_string()),
        Just("```".to_string()),
        Just("```python".to_string()),
        Just(String::new()),
        Just("## Chapter 3: Backups".to_string()),
        Just("### Appendix B".to_string()),
        Just("#Summary".to_string()),
        Just("<img src=\"../../images/Backup%20Drive.png\" alt=\"Drive\">".to_string()),
        Just("<img src='a (1).png'>".to_string()),
        Just("![x](../images/My%20Image.png \"Caption\")".to_string()),
        Just("![x](</images/raw 100%.png>)".to_string()),
        Just("![x](https://example.com/a.png)".to_string()),
        Just("See [Restore](../Part II/Restore.md#steps) and [web](https://x.org/a.md).".to_string()),
        Just("[**Bold**](other.md)".to_string()),
        Just("![[a](b.md)](../c.png)".to_string()),
        Just("    ```bash".to_string()),
        Just("* * *".to_string()),
        "[a-z ]{0,20}",
        "[a-z]{60,120}",
        "    [a-z ,./=-]{70,140}",
    ]
}

fn markdown_text() -> impl Strategy<Value = String> {
    prop::collection::vec(markdown_line(), 0..30).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn prop_normalize_is_idempotent(text in markdown_text()) {
        let pipeline = Pipeline::default();
        let once = pipeline.normalize(&text);
        prop_assert_eq!(pipeline.normalize(&once), once);
    }

    #[test]
    fn prop_first_heading_rule_is_idempotent(text in markdown_text()) {
        let pipeline = Pipeline::default().with_title_rule(FirstHeading);
        let once = pipeline.normalize(&text);
        prop_assert_eq!(pipeline.normalize(&once), once);
    }

    #[test]
    fn prop_code_lines_fit_after_normalizing(text in markdown_text()) {
        let pipeline = Pipeline::default();
        let once = pipeline.normalize(&text);
        let mut inside = false;
        for line in once.split('\n') {
            if folio::fence::is_fence_marker(line) {
                inside = !inside;
            } else if inside {
                prop_assert!(line.chars().count() <= pipeline.wrap_width, "{:?}", line);
            }
        }
    }
}
