mod common;

use candle_sft::dataset::{Dataset, Encoder, Table, TabularDataset, TokenizedDataset};
use candle_sft::error::PipelineError;
use candle_sft::loaders::{HubSource, ModelSource};
use common::{sentiment_dataset, tiny_bert};
use tokenizers::PaddingParams;

#[test]
fn encodings_are_fixed_length_and_deterministic() -> anyhow::Result<()> {
    let model = tiny_bert();
    let tokenizer = HubSource.tokenizer(&model.model_id())?;

    let a = TokenizedDataset::new(sentiment_dataset(8), &tokenizer, 12)?;
    let b = TokenizedDataset::new(sentiment_dataset(8), &tokenizer, 12)?;

    assert_eq!(a.len(), 8);
    for i in 0..a.len() {
        let (ids, mask) = a.encoded_sample(i)?;
        assert_eq!(ids.len(), 12);
        assert_eq!(mask.len(), 12);
        assert_eq!(a.encoded_sample(i)?, b.encoded_sample(i)?);
        assert_eq!(ids[0], 2, "starts with [CLS]");
        let real = mask.iter().filter(|&&m| m == 1).count();
        assert!(ids[real..].iter().all(|&id| id == 0), "padded with [PAD]");
    }
    assert_eq!(a.labels(), &[0, 1, 2, 0, 1, 2, 0, 1]);
    Ok(())
}

#[test]
fn long_rows_are_truncated() -> anyhow::Result<()> {
    let model = tiny_bert();
    let tokenizer = HubSource.tokenizer(&model.model_id())?;
    let table = Table::from_columns([
        ("source", vec!["good ".repeat(50)]),
        ("target", vec!["2".to_string()]),
    ])?;

    let dataset = TokenizedDataset::new(TabularDataset::new(table)?, &tokenizer, 6)?;
    let (ids, mask) = dataset.encoded_sample(0)?;
    assert_eq!(ids.len(), 6);
    assert!(mask.iter().all(|&m| m == 1));
    assert_eq!(ids[5], 3, "ends with [SEP]");
    Ok(())
}

#[test]
fn out_of_range_access_fails_on_both_views() -> anyhow::Result<()> {
    let model = tiny_bert();
    let tokenizer = HubSource.tokenizer(&model.model_id())?;
    let rows = sentiment_dataset(3);
    let dataset = TokenizedDataset::new(rows.clone(), &tokenizer, 8)?;

    for index in [3, 4, usize::MAX] {
        assert!(matches!(
            rows.sample(index),
            Err(PipelineError::IndexOutOfRange { len: 3, .. })
        ));
        assert!(matches!(
            dataset.sample(index),
            Err(PipelineError::IndexOutOfRange { len: 3, .. })
        ));
        assert!(matches!(
            dataset.encoded_sample(index),
            Err(PipelineError::IndexOutOfRange { len: 3, .. })
        ));
    }
    Ok(())
}

#[test]
fn tokenized_dataset_requires_targets() -> anyhow::Result<()> {
    let model = tiny_bert();
    let tokenizer = HubSource.tokenizer(&model.model_id())?;
    let table = Table::from_columns([("source", vec!["good".to_string()])])?;

    let result = TokenizedDataset::new(TabularDataset::new(table)?, &tokenizer, 8);
    assert!(matches!(result, Err(PipelineError::MissingColumn(name)) if name == "target"));
    Ok(())
}

#[test]
fn configured_padding_id_is_used() -> anyhow::Result<()> {
    let model = tiny_bert();
    let mut tokenizer = HubSource.tokenizer(&model.model_id())?;
    tokenizer.with_padding(Some(PaddingParams {
        pad_id: 4,
        pad_token: "the".into(),
        ..Default::default()
    }));

    let encoder = Encoder::new(&tokenizer, 12)?;
    assert_eq!(encoder.pad_id(), 4);

    let encoding = encoder.encode_fixed("good")?;
    let real = encoding.attention_mask.iter().filter(|&&m| m == 1).count();
    assert!(real < 12);
    assert!(encoding.input_ids[real..].iter().all(|&id| id == 4));
    Ok(())
}
