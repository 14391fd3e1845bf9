//! Reading `<Schema>` elements into owned definitions

use std::collections::HashMap;

use roxmltree::Node;

use crate::error::SchemaError;
use crate::model::NavigationProperty;
use crate::model::ReferentialConstraint;
use crate::model::types::EnumMember;
use crate::model::types::EnumType;

/// A `<Property>` element.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PropertyDef {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
    pub concurrency_fixed: bool,
}

/// An `<EntityType>` or `<ComplexType>` element.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct StructuredDef {
    pub name: String,
    pub base_type: Option<String>,
    pub key: Vec<String>,
    pub properties: Vec<PropertyDef>,
    pub navigation: Vec<NavigationProperty>,
}

/// An `<EntitySet>` inside an `<EntityContainer>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySetDef {
    /// Entity set name, e.g. `Products`.
    pub name: String,
    /// Qualified entity type, e.g. `Shop.Product`.
    pub entity_type: String,
}

/// Everything one `<Schema>` element declares.
#[derive(Debug, Clone, Default)]
pub(crate) struct SchemaDef {
    pub namespace: String,
    pub alias: Option<String>,
    pub entity_types: Vec<StructuredDef>,
    pub complex_types: Vec<StructuredDef>,
    pub enum_types: Vec<EnumType>,
    pub entity_sets: Vec<EntitySetDef>,
}

/// v2 `<Association>` end: role name to (type, multiplicity).
type AssociationEnds = HashMap<String, (String, String)>;

/// Strips a `Namespace.` or `Alias.` prefix from a qualified name.
pub(crate) fn strip_namespace(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn attr(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

fn required_attr(node: Node<'_, '_>, name: &str) -> Result<String, SchemaError> {
    attr(node, name).ok_or_else(|| {
        SchemaError::invalid_metadata(format!(
            "<{}> is missing the {} attribute",
            node.tag_name().name(),
            name
        ))
    })
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.has_tag_name(tag))
}

impl SchemaDef {
    pub(crate) fn from_node(schema: Node<'_, '_>) -> Result<Self, SchemaError> {
        let namespace = required_attr(schema, "Namespace")?;
        let associations = read_associations(schema);

        let mut def = SchemaDef {
            alias: attr(schema, "Alias"),
            namespace,
            ..SchemaDef::default()
        };

        for node in children(schema, "EntityType") {
            def.entity_types.push(read_structured(node, &associations)?);
        }
        for node in children(schema, "ComplexType") {
            def.complex_types.push(read_structured(node, &associations)?);
        }
        for node in children(schema, "EnumType") {
            def.enum_types.push(read_enum(node, &def.namespace)?);
        }
        for container in children(schema, "EntityContainer") {
            for set in children(container, "EntitySet") {
                def.entity_sets.push(EntitySetDef {
                    name: required_attr(set, "Name")?,
                    entity_type: required_attr(set, "EntityType")?,
                });
            }
        }

        log::debug!(
            "Parsed schema {}: {} entity types, {} complex types, {} enum types, {} entity sets",
            def.namespace,
            def.entity_types.len(),
            def.complex_types.len(),
            def.enum_types.len(),
            def.entity_sets.len()
        );
        Ok(def)
    }
}

fn read_property(node: Node<'_, '_>) -> Result<PropertyDef, SchemaError> {
    Ok(PropertyDef {
        name: required_attr(node, "Name")?,
        type_name: required_attr(node, "Type")?,
        nullable: node.attribute("Nullable") != Some("false"),
        concurrency_fixed: node.attribute("ConcurrencyMode") == Some("Fixed"),
    })
}

fn read_structured(node: Node<'_, '_>, associations: &HashMap<String, AssociationEnds>) -> Result<StructuredDef, SchemaError> {
    let mut def = StructuredDef {
        name: required_attr(node, "Name")?,
        base_type: attr(node, "BaseType"),
        ..StructuredDef::default()
    };

    for key in children(node, "Key") {
        for property_ref in children(key, "PropertyRef") {
            def.key.push(required_attr(property_ref, "Name")?);
        }
    }
    for property in children(node, "Property") {
        def.properties.push(read_property(property)?);
    }
    for navigation in children(node, "NavigationProperty") {
        def.navigation.push(read_navigation(navigation, associations)?);
    }
    Ok(def)
}

fn read_navigation(
    node: Node<'_, '_>,
    associations: &HashMap<String, AssociationEnds>,
) -> Result<NavigationProperty, SchemaError> {
    let name = required_attr(node, "Name")?;

    // v2 services describe the target through an Association instead of Type
    let type_name = match attr(node, "Type") {
        Some(type_name) => type_name,
        None => {
            let relationship = required_attr(node, "Relationship")?;
            let to_role = required_attr(node, "ToRole")?;
            let (target, multiplicity) = associations
                .get(strip_namespace(&relationship))
                .and_then(|ends| ends.get(&to_role))
                .ok_or_else(|| {
                    SchemaError::invalid_metadata(format!(
                        "association {} has no end {} for navigation property {}",
                        relationship, to_role, name
                    ))
                })?;
            if multiplicity == "*" {
                format!("Collection({})", target)
            } else {
                target.clone()
            }
        }
    };

    let referential_constraints = children(node, "ReferentialConstraint")
        .map(|c| {
            Ok(ReferentialConstraint {
                property: required_attr(c, "Property")?,
                referenced_property: required_attr(c, "ReferencedProperty")?,
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;

    Ok(NavigationProperty {
        nullable: node.attribute("Nullable") != Some("false"),
        partner: attr(node, "Partner"),
        name,
        type_name,
        referential_constraints,
    })
}

fn read_associations(schema: Node<'_, '_>) -> HashMap<String, AssociationEnds> {
    children(schema, "Association")
        .filter_map(|association| {
            let name = attr(association, "Name")?;
            let ends = children(association, "End")
                .filter_map(|end| {
                    Some((
                        attr(end, "Role")?,
                        (attr(end, "Type")?, attr(end, "Multiplicity").unwrap_or_default()),
                    ))
                })
                .collect();
            Some((name, ends))
        })
        .collect()
}

fn read_enum(node: Node<'_, '_>, namespace: &str) -> Result<EnumType, SchemaError> {
    let mut enum_type = EnumType::new(namespace, required_attr(node, "Name")?);
    enum_type.is_flags = node.attribute("IsFlags") == Some("true");
    if let Some(underlying) = attr(node, "UnderlyingType") {
        enum_type.underlying_type = underlying;
    }

    for (index, member) in children(node, "Member").enumerate() {
        let name = required_attr(member, "Name")?;
        let value = match member.attribute("Value") {
            Some(v) => v.trim().parse::<i64>().map_err(|_| {
                SchemaError::invalid_metadata(format!(
                    "member {} of enum {} has a non-integer value '{}'",
                    name, enum_type.name, v
                ))
            })?,
            None => index as i64,
        };
        let annotation = children(member, "Annotation")
            .find_map(|a| a.attribute("String"))
            .map(str::to_string);
        enum_type.members.push(EnumMember {
            name,
            value,
            annotation,
        });
    }
    Ok(enum_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> SchemaDef {
        let doc = roxmltree::Document::parse(xml).unwrap();
        SchemaDef::from_node(doc.root_element()).unwrap()
    }

    #[test]
    fn test_enum_members() {
        let def = parse(
            r#"<Schema Namespace="Shop" xmlns="http://docs.oasis-open.org/odata/ns/edm">
                <EnumType Name="Access" IsFlags="true" UnderlyingType="Edm.Int64">
                    <Member Name="Read" Value="1"><Annotation Term="Core.Description" String="May read"/></Member>
                    <Member Name="Write" Value="2"/>
                </EnumType>
                <EnumType Name="Color"><Member Name="Red"/><Member Name="Blue"/></EnumType>
            </Schema>"#,
        );
        let access = &def.enum_types[0];
        assert!(access.is_flags);
        assert_eq!(access.underlying_type, "Edm.Int64");
        assert_eq!(access.annotation("Read"), Some("May read"));

        let color = &def.enum_types[1];
        assert_eq!(color.member_by_name("Blue").unwrap().value, 1);
    }

    #[test]
    fn test_v2_association_navigation() {
        let def = parse(
            r#"<Schema Namespace="Shop">
                <EntityType Name="Category">
                    <Key><PropertyRef Name="ID"/></Key>
                    <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
                    <NavigationProperty Name="Products" Relationship="Shop.Category_Products" FromRole="Category" ToRole="Products"/>
                </EntityType>
                <Association Name="Category_Products">
                    <End Role="Category" Type="Shop.Category" Multiplicity="0..1"/>
                    <End Role="Products" Type="Shop.Product" Multiplicity="*"/>
                </Association>
            </Schema>"#,
        );
        let category = &def.entity_types[0];
        assert_eq!(category.key, vec!["ID"]);
        assert!(!category.properties[0].nullable);
        assert_eq!(category.navigation[0].type_name, "Collection(Shop.Product)");
    }

    #[test]
    fn test_missing_attribute_is_reported() {
        let doc = roxmltree::Document::parse(r#"<Schema Namespace="Shop"><EntityType/></Schema>"#).unwrap();
        let err = SchemaDef::from_node(doc.root_element()).unwrap_err();
        assert!(err.to_string().contains("EntityType"));
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(strip_namespace("Shop.Product"), "Product");
        assert_eq!(strip_namespace("Product"), "Product");
    }
}
