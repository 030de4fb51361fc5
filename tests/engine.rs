use bill_injector::ToolError;
use bill_injector::filter::{rejected_rows, retain_convention_rows};
use bill_injector::identity::{MeterIdentity, normalize_record, normalize_template_value};
use bill_injector::matcher::{MatchSet, group_by_meter, insertion_point};
use bill_injector::model::{BillingRecord, CellValue, Column, EndReadType, Sheet};
use bill_injector::sheet::TabularSheet;
use bill_injector::synthesize::synthesize_rows;
use bill_injector::validate::{Field, Finding, check_coverage, check_overlap, validate};
use chrono::NaiveDate;
use std::collections::BTreeSet;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn header() -> Vec<CellValue> {
    [
        "Meter ID (Pre-filled)",
        "Meter Consumption ID (Pre-filled)",
        "Portfolio Manager ID (Pre-filled)",
        "Property Name (Pre-filled)",
        "Meter Name\n(Pre-filled)",
        "Meter Type (Pre-filled)",
        "Start Date\n(Required)",
        "End Date\n(Required)",
        "Quantity\n(Required)",
        "Unit (Pre-filled)",
        "Cost\n(Optional)",
        "Estimation (Required)",
    ]
    .into_iter()
    .map(CellValue::from)
    .collect()
}

fn template_row(identity: &str, meter_id: f64) -> Vec<CellValue> {
    vec![
        CellValue::Number(meter_id),
        CellValue::Number(900.0),
        CellValue::Number(42.0),
        "City Hall".into(),
        identity.into(),
        "Natural Gas".into(),
        CellValue::Date(date(2021, 12, 1)),
        CellValue::Date(date(2021, 12, 31)),
        CellValue::Number(400.0),
        "therms".into(),
        CellValue::Number(99.0),
        "No".into(),
    ]
}

fn record(
    customer: &str,
    meter: &str,
    start: NaiveDate,
    volume: f64,
    charges: f64,
) -> BillingRecord {
    BillingRecord {
        customer_id: customer.to_string(),
        meter_number: meter.to_string(),
        cycle_start: start,
        cycle_end: start + chrono::Duration::days(30),
        fee_volume: volume,
        total_charges: charges,
        end_read_type: EndReadType::Actual,
    }
}

/// Template row carrying the bill values of `record`, as synthesis writes it.
fn bill_row(identity: &str, record: &BillingRecord) -> Vec<CellValue> {
    let mut row = template_row(identity, 1.0);
    row[6] = CellValue::Date(record.cycle_start);
    row[7] = CellValue::Date(record.cycle_end);
    row[8] = CellValue::Number(record.fee_volume);
    row[10] = CellValue::from(record.total_charges);
    row[11] = record.actual_or_estimated().into();
    row
}

fn identities(sheet: &Sheet) -> Vec<String> {
    (1..=sheet.row_count())
        .map(|row| sheet.cell(row, Column::E).to_text())
        .collect()
}

#[test]
fn normalizing_canonical_identity_is_idempotent() {
    for value in [
        "Constellation__RG-99__0012345678",
        "Constellation__RG-1__9876543210__Boiler Room",
        "Constellation__RG-123456__0000000001",
    ] {
        assert_eq!(normalize_template_value(value).as_deref(), Some(value));
        let suffixed = format!("{value}, moved 2021");
        assert_eq!(normalize_template_value(&suffixed).as_deref(), Some(value));
    }
}

#[test]
fn non_canonical_template_values_are_rejected() {
    for value in [
        "009300523",
        "Constellation__RG-12__123",
        "Constellation__AB-12__0012345678",
        "Constellation__RG-__0012345678",
        "Constellation__RG-12__001234567X",
        "Other__RG-12__0012345678",
    ] {
        assert!(MeterIdentity::parse_template(value).is_none(), "{value} accepted");
    }
}

#[test]
fn text_after_the_meter_digits_is_tolerated() {
    for value in [
        "Constellation__RG-12__0012345678X",
        "Constellation__RG-12__0012345678 Boiler",
        "Constellation__RG-12__0012345678-old",
    ] {
        let identity = MeterIdentity::parse_template(value).expect("tail accepted");
        assert_eq!(identity.meter_number(), "0012345678");
        assert_eq!(identity.description(), None);
        assert_eq!(identity, MeterIdentity::from_parts("RG-12", "0012345678"));
        assert_eq!(normalize_template_value(value).as_deref(), Some(value));
    }

    let tailed = "Constellation__RG-12__0012345678 Boiler";
    let mut sheet = Sheet::new("bills", vec![header(), template_row(tailed, 1.0)]);
    let records = vec![record("RG-12", "0012345678", date(2022, 1, 1), 10.0, 5.0)];

    assert_eq!(retain_convention_rows(&mut sheet), 0);
    let match_set = MatchSet::from_sheet(&sheet);
    assert_eq!(match_set.len(), 1);
    let outcome =
        synthesize_rows(&mut sheet, &group_by_meter(&records), &match_set).expect("synthesized");
    assert_eq!(outcome.rows_inserted, 1);
    assert_eq!(sheet.cell(2, Column::E), &CellValue::from(tailed));

    let report = validate(&records, &sheet).expect("validated");
    assert!(report.is_empty(), "{report}");
}

#[test]
fn identity_equality_ignores_description() {
    let described = MeterIdentity::parse_template("Constellation__RG-7__0000000007__Pool, old")
        .expect("parsed");
    let plain = MeterIdentity::from_parts("RG-7", "0000000007");

    assert_eq!(described, plain);
    assert_eq!(described.description(), Some("Pool"));
    assert_eq!(described.canonical(), "Constellation__RG-7__0000000007");
    assert_eq!(normalize_record("RG-7", "0000000007"), plain.canonical());
}

#[test]
fn filter_deletes_bottom_up_without_shifting_errors() {
    let mut sheet = Sheet::new(
        "Add Bills-Non Electric",
        vec![
            header(),
            template_row("Constellation__RG-1__0000000001", 1.0),
            template_row("009300523", 2.0),
            template_row("Constellation__RG-3__0000000003", 3.0),
            template_row("Unmapped meter", 4.0),
        ],
    );

    assert_eq!(rejected_rows(&sheet), vec![3, 5]);
    let removed = retain_convention_rows(&mut sheet);

    assert_eq!(removed, 2);
    assert_eq!(
        identities(&sheet),
        vec![
            "Meter Name\n(Pre-filled)",
            "Constellation__RG-1__0000000001",
            "Constellation__RG-3__0000000003",
        ]
    );
}

#[test]
fn filter_keeps_header_and_adjacent_rejects() {
    let mut sheet = Sheet::new(
        "bills",
        vec![
            header(),
            template_row("a", 1.0),
            template_row("b", 2.0),
            template_row("Constellation__RG-5__0000000005", 5.0),
            template_row("", 6.0),
            vec![],
        ],
    );
    let before = sheet.row_count();

    let removed = retain_convention_rows(&mut sheet);

    assert_eq!(sheet.row_count(), before - removed);
    assert_eq!(sheet.rows[0], header());
    assert_eq!(sheet.row_count(), 2);
    assert!(
        sheet
            .data_rows()
            .all(|row| sheet.cell(row, Column::E).to_text().starts_with("Constellation__RG-"))
    );
}

#[test]
fn records_for_untracked_meters_are_never_synthesized() {
    let mut sheet = Sheet::new(
        "bills",
        vec![header(), template_row("Constellation__RG-1__0000000001", 1.0)],
    );
    let records = vec![
        record("RG-3", "0000000003", date(2022, 1, 1), 10.0, 5.0),
        record("RG-1", "0000000001", date(2022, 1, 1), 10.0, 5.0),
    ];
    let groups = group_by_meter(&records);
    let match_set = MatchSet::from_sheet(&sheet);

    let outcome = synthesize_rows(&mut sheet, &groups, &match_set).expect("synthesized");

    assert_eq!(outcome.rows_inserted, 1);
    assert_eq!(outcome.records_skipped, 1);
    assert!(
        !identities(&sheet)
            .iter()
            .any(|identity| identity.contains("0000000003"))
    );
}

#[test]
fn synthesized_rows_stack_below_anchor_in_export_order() {
    let meter_one = "Constellation__RG-1__0000000001";
    let meter_two = "Constellation__RG-2__0000000002";
    let mut sheet = Sheet::new(
        "bills",
        vec![header(), template_row(meter_one, 101.0), template_row(meter_two, 202.0)],
    );
    let records = vec![
        record("RG-1", "0000000001", date(2022, 1, 1), 10.0, 1.0),
        record("RG-2", "0000000002", date(2022, 1, 1), 20.0, 2.0),
        record("RG-1", "0000000001", date(2022, 2, 1), 11.0, 1.5),
        record("RG-1", "0000000001", date(2022, 3, 1), 12.0, f64::NAN),
    ];
    let groups = group_by_meter(&records);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].records.len(), 3);

    let match_set = MatchSet::from_sheet(&sheet);
    let outcome = synthesize_rows(&mut sheet, &groups, &match_set).expect("synthesized");

    assert_eq!(outcome.rows_inserted, 4);
    assert_eq!(
        outcome.meters,
        BTreeSet::from([meter_one.to_string(), meter_two.to_string()])
    );
    assert_eq!(
        identities(&sheet)[1..],
        [meter_one, meter_one, meter_one, meter_one, meter_two, meter_two]
    );

    let starts: Vec<CellValue> = (3..=5).map(|row| sheet.cell(row, Column::G).clone()).collect();
    assert_eq!(
        starts,
        vec![
            CellValue::Date(date(2022, 1, 1)),
            CellValue::Date(date(2022, 2, 1)),
            CellValue::Date(date(2022, 3, 1)),
        ]
    );

    for row in 3..=5 {
        for column in [Column::A, Column::C, Column::D, Column::F, Column::J] {
            assert_eq!(sheet.cell(row, column), sheet.cell(row - 1, column));
        }
        assert_eq!(sheet.cell(row, Column::A), &CellValue::Number(101.0));
        assert_eq!(sheet.cell(row, Column::B), &CellValue::Empty);
    }
    assert_eq!(sheet.cell(5, Column::K), &CellValue::Empty);
    assert_eq!(sheet.cell(7, Column::A), &CellValue::Number(202.0));
    assert_eq!(sheet.cell(7, Column::I), &CellValue::Number(20.0));
}

#[test]
fn missing_anchor_row_is_a_structural_error() {
    let sheet = Sheet::new(
        "bills",
        vec![header(), template_row("Constellation__RG-1__0000000001", 1.0)],
    );
    let identity = MeterIdentity::from_parts("RG-2", "0000000002");

    let error = insertion_point(&sheet, &identity).expect_err("no anchor");
    assert!(matches!(
        error,
        ToolError::MissingAnchorRow { identity } if identity.ends_with("0000000002")
    ));
}

#[test]
fn coverage_names_source_only_meters() {
    let source = BTreeSet::from([1, 2, 3]);
    let output = BTreeSet::from([1, 2]);

    assert_eq!(
        check_coverage(&source, &BTreeSet::new(), &output),
        Some(Finding::MissingFromTemplate {
            meters: BTreeSet::from([3]),
            unnumbered: BTreeSet::new(),
        })
    );
    assert_eq!(check_coverage(&output, &BTreeSet::new(), &source), None);
    let (overlap, not_updated) = check_overlap(&source, &output).expect("overlap");
    assert_eq!(overlap, BTreeSet::from([1, 2]));
    assert_eq!(not_updated, None);
}

#[test]
fn empty_overlap_is_a_precondition_failure() {
    let source = BTreeSet::from([1, 2]);
    let output = BTreeSet::from([3]);
    assert!(matches!(
        check_overlap(&source, &output),
        Err(ToolError::NoOverlappingMeters)
    ));
}

#[test]
fn template_meters_without_bills_are_warned_about() {
    let (_, warning) =
        check_overlap(&BTreeSet::from([1]), &BTreeSet::from([1, 4])).expect("overlap");
    assert_eq!(
        warning,
        Some(Finding::NotUpdated {
            meters: BTreeSet::from([4])
        })
    );
}

#[test]
fn blank_cost_on_both_sides_is_not_a_mismatch() {
    let identity = "Constellation__RG-1__0000000001";
    let mut synthesized = template_row(identity, 1.0);
    synthesized[6] = CellValue::Date(date(2022, 1, 1));
    synthesized[7] = CellValue::Date(date(2022, 1, 31));
    synthesized[8] = CellValue::Number(10.0);
    synthesized[10] = CellValue::Empty;
    let sheet = Sheet::new("bills", vec![header(), template_row(identity, 1.0), synthesized]);
    let records = vec![record("RG-1", "0000000001", date(2022, 1, 1), 10.0, f64::NAN)];

    let report = validate(&records, &sheet).expect("validated");

    assert!(report.is_empty(), "{report}");
}

#[test]
fn field_mismatches_are_collected_with_advisory() {
    let identity = "Constellation__RG-1__0000000001";
    let mut synthesized = template_row(identity, 1.0);
    synthesized[6] = CellValue::Date(date(2022, 1, 1));
    synthesized[7] = CellValue::Date(date(2022, 1, 31));
    synthesized[8] = CellValue::Number(12.0);
    synthesized[10] = CellValue::Number(5.0);
    synthesized[11] = "Yes".into();
    let sheet = Sheet::new("bills", vec![header(), template_row(identity, 1.0), synthesized]);
    let records = vec![record("RG-1", "0000000001", date(2022, 1, 1), 10.0, 5.0)];

    let report = validate(&records, &sheet).expect("validated");

    let fields: Vec<Field> = report
        .errors()
        .filter_map(|finding| match finding {
            Finding::FieldMismatch { field, .. } => Some(*field),
            _ => None,
        })
        .collect();
    assert_eq!(fields, vec![Field::Quantity, Field::Estimation]);

    let rendered = report.to_string();
    assert!(rendered.contains("ERROR: Quantity mismatch, meter #0000000001"));
    assert!(rendered.contains("DOUBLE CHECK"));
}

#[test]
fn meter_without_synthesized_row_is_reported() {
    let identity = "Constellation__RG-1__0000000001";
    let sheet = Sheet::new("bills", vec![header(), template_row(identity, 1.0)]);
    let records = vec![record("RG-1", "0000000001", date(2022, 1, 1), 10.0, 5.0)];

    let report = validate(&records, &sheet).expect("validated");

    assert_eq!(
        report.findings,
        vec![Finding::MissingSynthesizedRow { meter: 1 }]
    );
}

#[test]
fn non_numeric_meter_segment_is_a_format_error() {
    let sheet = Sheet::new(
        "bills",
        vec![header(), template_row("Constellation__RG-1__00000X0001", 1.0)],
    );
    let records = vec![record("RG-1", "0000000001", date(2022, 1, 1), 10.0, 5.0)];

    assert!(matches!(
        validate(&records, &sheet),
        Err(ToolError::InvalidMeterNumber { .. })
    ));
}

#[test]
fn single_bill_round_trip_validates_cleanly() {
    let identity = "Constellation__RG-99__0012345678";
    let mut sheet = Sheet::new("bills", vec![header(), template_row(identity, 1.0)]);
    let records = vec![BillingRecord {
        customer_id: "RG-99".to_string(),
        meter_number: "0012345678".to_string(),
        cycle_start: date(2022, 1, 1),
        cycle_end: date(2022, 1, 31),
        fee_volume: 500.0,
        total_charges: 120.50,
        end_read_type: EndReadType::Actual,
    }];

    retain_convention_rows(&mut sheet);
    let match_set = MatchSet::from_sheet(&sheet);
    let outcome =
        synthesize_rows(&mut sheet, &group_by_meter(&records), &match_set).expect("synthesized");

    assert_eq!(outcome.rows_inserted, 1);
    assert_eq!(sheet.row_count(), 3);
    assert_eq!(sheet.cell(3, Column::E), &CellValue::from(identity));
    assert_eq!(sheet.cell(3, Column::G), &CellValue::Date(date(2022, 1, 1)));
    assert_eq!(sheet.cell(3, Column::H), &CellValue::Date(date(2022, 1, 31)));
    assert_eq!(sheet.cell(3, Column::I), &CellValue::Number(500.0));
    assert_eq!(sheet.cell(3, Column::K), &CellValue::Number(120.50));
    assert_eq!(sheet.cell(3, Column::L), &CellValue::from("No"));

    let report = validate(&records, &sheet).expect("validated");
    assert!(!report.has_errors(), "{report}");
    assert_eq!(report.overlap, BTreeSet::from([12345678]));
}

#[test]
fn non_numeric_export_meter_is_only_a_coverage_warning() {
    let identity = "Constellation__RG-99__0012345678";
    let matched = record("RG-99", "0012345678", date(2022, 1, 1), 500.0, 120.5);
    let sheet = Sheet::new(
        "bills",
        vec![header(), template_row(identity, 1.0), bill_row(identity, &matched)],
    );
    let records = vec![
        matched,
        record("RG-5", "E-778", date(2022, 1, 4), 3.0, 1.0),
    ];

    let report = validate(&records, &sheet).expect("validated");

    assert!(!report.has_errors(), "{report}");
    assert_eq!(
        report.findings,
        vec![Finding::MissingFromTemplate {
            meters: BTreeSet::new(),
            unnumbered: BTreeSet::from(["E-778".to_string()]),
        }]
    );
    assert_eq!(report.overlap, BTreeSet::from([12345678]));
    let rendered = report.to_string();
    assert!(rendered.contains("There are **1** more unique meters"));
    assert!(rendered.contains("{E-778}"));
}

#[test]
fn latest_bill_is_compared_with_second_output_row() {
    let identity = "Constellation__RG-1__0000000001";
    let older = record("RG-1", "0000000001", date(2022, 1, 1), 10.0, 4.0);
    let latest = record("RG-1", "0000000001", date(2022, 2, 1), 11.0, 4.5);
    let records = vec![older.clone(), latest.clone()];

    let sheet = Sheet::new(
        "bills",
        vec![
            header(),
            template_row(identity, 1.0),
            bill_row(identity, &latest),
            bill_row(identity, &older),
        ],
    );
    let report = validate(&records, &sheet).expect("validated");
    assert!(report.is_empty(), "{report}");

    // Synthesis stacks bills in export order, so the second output row holds
    // the older bill and the comparison reports it.
    let mut synthesized = Sheet::new("bills", vec![header(), template_row(identity, 1.0)]);
    let match_set = MatchSet::from_sheet(&synthesized);
    synthesize_rows(&mut synthesized, &group_by_meter(&records), &match_set).expect("synthesized");
    assert_eq!(synthesized.cell(3, Column::G), &CellValue::Date(older.cycle_start));

    let report = validate(&records, &synthesized).expect("validated");
    let fields: Vec<Field> = report
        .errors()
        .filter_map(|finding| match finding {
            Finding::FieldMismatch { field, .. } => Some(*field),
            _ => None,
        })
        .collect();
    assert_eq!(
        fields,
        vec![Field::StartDate, Field::EndDate, Field::Quantity, Field::Cost]
    );
}
