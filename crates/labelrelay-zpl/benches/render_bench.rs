// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for ZPL label rendering.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use labelrelay_zpl::{LabelSpec, Symbology, Template, render};

fn sale_spec() -> LabelSpec {
    LabelSpec::Sale {
        product_title: "Lavandula angustifolia 'Hidcote'".into(),
        size: Some("9cm pot".into()),
        price_text: "€5.99".into(),
        barcode: "8712345678906".into(),
        symbology: Symbology::Ean13,
        footer: Some("Hardy perennial — full sun".into()),
        lot_number: Some("L-2026-08-17".into()),
    }
}

fn bench_render_compact(c: &mut Criterion) {
    let template = Template::new(40.0, 40.0);
    let spec = sale_spec();
    c.bench_function("render_compact_40mm", |b| {
        b.iter(|| render(black_box(&spec), black_box(&template), 3))
    });
}

fn bench_render_full(c: &mut Criterion) {
    let template = Template::new(102.0, 51.0);
    let spec = sale_spec();
    c.bench_function("render_full_102mm", |b| {
        b.iter(|| render(black_box(&spec), black_box(&template), 1))
    });
}

fn bench_render_custom(c: &mut Criterion) {
    let mut template = Template::new(50.0, 30.0);
    template.custom_zpl = Some(
        "^XA^CI28^FO20,20^A0N,40,40^FH^FD{{productTitle}}^FS\
         ^FO20,70^A0N,50,50^FH^FD{{priceText}}^FS\
         ^FO20,130^BY2^BCN,80,Y,N,N^FD{{barcode}}^FS^XZ"
            .into(),
    );
    let spec = sale_spec();
    c.bench_function("render_custom_template", |b| {
        b.iter(|| render(black_box(&spec), black_box(&template), 2))
    });
}

criterion_group!(
    benches,
    bench_render_compact,
    bench_render_full,
    bench_render_custom
);
criterion_main!(benches);
