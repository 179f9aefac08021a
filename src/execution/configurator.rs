//! Builds the analysis descriptors from workflow configuration

use crate::core::config::WorkflowConfig;
use crate::core::{
    AnalysisConfig, BiasConfig, DataConfig, DatasetLocation, ModelConfig,
    ModelPredictedLabelConfig, ProcessingResources,
};
use crate::execution::error::Result;
use tracing::debug;

/// The four descriptors plus the combined analysis configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BiasDescriptors {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub predicted_label: ModelPredictedLabelConfig,
    pub bias: BiasConfig,
    pub analysis: AnalysisConfig,
}

/// Copies configuration values into descriptors
///
/// Values are taken verbatim. Only presence is checked; whether the facet
/// exists in the data or the model actually answers in the configured
/// format is left to the analysis job.
pub struct BiasJobConfigurator<'a> {
    config: &'a WorkflowConfig,
}

impl<'a> BiasJobConfigurator<'a> {
    pub fn new(config: &'a WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn data_config(&self, dataset: &DatasetLocation) -> Result<DataConfig> {
        let section = &self.config.dataset;
        let data = DataConfig {
            s3_data_input_path: dataset.uri.clone(),
            s3_output_path: self.config.job.output.clone(),
            label: section.label.clone(),
            features: section.features.clone(),
            headers: section.headers.clone(),
            dataset_type: dataset.content_type,
        };
        data.validate()?;
        Ok(data)
    }

    pub fn model_config(&self, model_name: &str) -> Result<ModelConfig> {
        let section = &self.config.model;
        let model = ModelConfig {
            model_name: model_name.to_string(),
            instance_type: section.instance_type.clone(),
            instance_count: section.instance_count,
            content_type: section.content_type,
            accept_type: section.accept_type,
            content_template: section.content_template.clone(),
        };
        model.validate()?;
        Ok(model)
    }

    pub fn predicted_label_config(&self) -> Result<ModelPredictedLabelConfig> {
        let section = &self.config.model;
        let predicted = ModelPredictedLabelConfig {
            label: section.predicted_label.clone(),
            probability: section.probability.clone(),
            probability_threshold: section.probability_threshold,
        };
        predicted.validate()?;
        Ok(predicted)
    }

    pub fn bias_config(&self) -> Result<BiasConfig> {
        let section = &self.config.bias;
        let bias = BiasConfig {
            label_values_or_threshold: section.label_values.clone(),
            facet_name: section.facet.clone(),
            facet_values_or_threshold: section.facet_values.clone(),
            group_name: section.group.clone(),
        };
        bias.validate()?;
        Ok(bias)
    }

    /// Build every descriptor for `model_name` evaluated on `dataset`
    pub fn configure(&self, dataset: &DatasetLocation, model_name: &str) -> Result<BiasDescriptors> {
        let data = self.data_config(dataset)?;
        let model = self.model_config(model_name)?;
        let predicted_label = self.predicted_label_config()?;
        let bias = self.bias_config()?;
        let analysis =
            AnalysisConfig::assemble(&data, &model, &predicted_label, &bias, &self.config.methods)?;

        debug!(
            "Configured bias analysis of {} on {} (facet {})",
            model.model_name, data.s3_data_input_path, bias.facet_name
        );

        Ok(BiasDescriptors {
            data,
            model,
            predicted_label,
            bias,
            analysis,
        })
    }

    /// Compute resources for the analysis job itself
    pub fn resources(&self) -> ProcessingResources {
        let job = &self.config.job;
        ProcessingResources {
            image_uri: job.image_uri.clone(),
            instance_type: job.instance_type.clone(),
            instance_count: job.instance_count,
            volume_size_gb: job.volume_size_gb,
            max_runtime_secs: job.max_runtime_secs,
        }
    }
}
