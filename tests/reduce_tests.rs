use factex::normalize;
use factex::reduce::{reduce, reduce_with_policy, ReducePolicy};

#[test]
fn test_styled_currency_value() {
    let reduced = reduce(r#"<span style="color:red;">$123,456.78</span>"#);
    assert!(reduced.contains("$123,456.78"));
    assert!(!reduced.contains("style"));
    assert!(reduced.len() < r#"<span style="color:red;">$123,456.78</span>"#.len());
}

#[test]
fn test_reduction_is_idempotent() {
    for input in [
        r#"<span style="color:red;">$123,456.78</span>"#,
        r#"<div class="neg"><b>(1,234)</b> loss</div>"#,
        "plain text with $9.99",
    ] {
        let once = reduce(input);
        assert_eq!(reduce(&once), once, "not idempotent for {}", input);
    }
}

#[test]
fn test_numeric_preservation_holds_for_fragments() {
    let fragments = [
        r#"<span style="font-weight:bold">$1,500,000</span>"#,
        r#"<td class="x">(2,340.50)</td>"#,
        r#"<p>margin of <b>21.4%</b> on <i>$95,281</i></p>"#,
        r#"<div><span color="red">(1.5%)</span> decline</div>"#,
        r#"<font face="Arial">&#36;42</font>"#,
    ];

    for fragment in fragments {
        let reduced = reduce(fragment);
        let before = normalize::token_counts(&visible_text(fragment));
        let after = normalize::token_counts(&visible_text(&reduced));
        assert_eq!(before, after, "token multiset changed for {}", fragment);
    }
}

fn visible_text(markup: &str) -> String {
    if !markup.contains('<') {
        return normalize::clean_text(markup);
    }
    let fragment = scraper::Html::parse_fragment(markup);
    normalize::clean_text(
        &fragment
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[test]
fn test_table_reduction_preserves_shape_and_literals() {
    let literals = [
        "$95,281", "+13.0%", "$84,310", "(2.1%)", "1,204", "$17,906", "21.4%", "$14,752", "3.3%",
        "902", "$1,250.75", "9.9%", "450", "$3,001", "0.5%",
    ];
    let mut cells: Vec<String> = literals
        .iter()
        .map(|v| format!(r#"<td style="font-size:10px;color:#444" align="right">{}</td>"#, v))
        .collect();
    // Pad to a 6x4 grid with label cells
    while cells.len() < 24 {
        cells.push(r#"<td style="font-size:10px" align="left">segment</td>"#.to_string());
    }
    let rows: String = cells
        .chunks(4)
        .map(|row| format!("<tr class=\"r\">{}</tr>", row.join("")))
        .collect();
    let table = format!(r#"<table class="fin" style="border-collapse:collapse">{}</table>"#, rows);

    let reduced = reduce(&table);
    assert!(reduced.len() < table.len());
    assert_eq!(reduced.matches("<tr").count(), 6);
    assert_eq!(reduced.matches("<td").count(), 24);
    for literal in literals {
        assert!(reduced.contains(literal), "lost {}", literal);
    }
    assert!(!reduced.contains("style="));
    assert!(reduced.contains(r#"align="right""#));
}

#[test]
fn test_zero_tolerance_still_protects_words() {
    let policy = ReducePolicy {
        text_loss_tolerance: 0.0,
    };
    let markup = r#"<div style="margin:0">net sales of $29,998 for the quarter</div>"#;
    let reduced = reduce_with_policy(markup, &policy);
    for word in ["net", "sales", "quarter", "$29,998"] {
        assert!(reduced.contains(word), "lost {}", word);
    }
}

#[test]
fn test_unreducible_input_comes_back_untouched() {
    for input in [
        "<td>$1,2",
        "<span>$5</span>",
        "no markup at all",
        "",
    ] {
        let reduced = reduce(input);
        if !input.contains('<') {
            assert_eq!(reduced, input);
        } else {
            // Whatever comes back, nothing numeric may change
            assert_eq!(
                normalize::token_counts(&visible_text(input)),
                normalize::token_counts(&visible_text(&reduced))
            );
        }
    }
}
